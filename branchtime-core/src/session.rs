//! The activity-driven session state machine.
//!
//! `SessionTracker` is either idle or tracking one [`ActiveSession`]. It is
//! fed resolved activity, inactivity deadlines and explicit stops, and hands
//! back the [`TimeEntry`] produced whenever a session long enough to count
//! is closed. It performs no I/O and reads no clock; callers pass `now`.

use crate::timer::Timer;
use crate::types::{ActiveSession, Attribution, TimeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Gap after the last activity at which a session is closed.
    pub inactivity_threshold_ms: i64,
    /// Sessions this short or shorter are discarded.
    pub min_session_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_ms: 30_000,
            min_session_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Inactivity,
    FocusLost,
    AttributionChanged,
    ResolutionFailed,
    Disposed,
}

impl StopReason {
    /// Stops that invalidate activity resolved before them.
    fn interrupts(&self) -> bool {
        matches!(self, StopReason::FocusLost | StopReason::Disposed)
    }
}

#[derive(Debug)]
pub struct SessionTracker {
    config: SessionConfig,
    session: Option<ActiveSession>,
    inactivity: Timer,
    epoch: u64,
}

impl SessionTracker {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: None,
            inactivity: Timer::new(),
            epoch: 0,
        }
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    /// Bumped by every interrupting stop (focus loss, dispose, discard).
    /// Resolutions started under an older epoch must not be applied.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn inactivity_deadline(&self) -> Option<i64> {
        self.inactivity.deadline()
    }

    /// Apply one coalesced activity whose workspace resolved to `resolved`
    /// (`None` when it is not attributable). Returns the entry of a session
    /// closed by an attribution change.
    ///
    /// A change of attribution stops the old session and starts the new one
    /// at the same `now`, so the switch itself adds neither gap nor overlap.
    pub fn observe(
        &mut self,
        now_ms: i64,
        resolved: Option<Attribution>,
        file: Option<String>,
    ) -> Option<TimeEntry> {
        let mut closed = None;

        if let Some(session) = self.session.as_mut() {
            if resolved.as_ref() == Some(&session.attribution) {
                session.touch(now_ms);
                session.record_file(file);
                let last_activity = session.last_activity;
                self.inactivity
                    .arm_after(last_activity, self.config.inactivity_threshold_ms);
                return None;
            }

            let reason = if resolved.is_some() {
                StopReason::AttributionChanged
            } else {
                StopReason::ResolutionFailed
            };
            closed = self.stop(now_ms, reason);
        }

        if let Some(attribution) = resolved {
            let mut session = ActiveSession::new(attribution, now_ms);
            session.record_file(file);
            self.inactivity
                .arm_after(now_ms, self.config.inactivity_threshold_ms);
            self.session = Some(session);
        }

        closed
    }

    /// Called when the inactivity deadline may have passed. A no-op unless
    /// the timer is due.
    pub fn expire(&mut self, now_ms: i64) -> Option<TimeEntry> {
        if !self.inactivity.is_due(now_ms) {
            return None;
        }
        self.stop(now_ms, StopReason::Inactivity)
    }

    /// Close the current session. Stopping while idle is a no-op.
    pub fn stop(&mut self, now_ms: i64, reason: StopReason) -> Option<TimeEntry> {
        self.inactivity.cancel();
        if reason.interrupts() {
            self.epoch += 1;
        }

        let session = self.session.take()?;

        let mut end = now_ms;
        if reason == StopReason::Inactivity {
            end = end.min(
                session
                    .last_activity
                    .saturating_add(self.config.inactivity_threshold_ms),
            );
        }
        let end = end.max(session.start_time);

        if end - session.start_time <= self.config.min_session_ms {
            return None;
        }

        Some(TimeEntry::new(
            &session.attribution,
            session.start_time,
            end,
            session.files,
        ))
    }

    /// Drop the current session without producing an entry.
    pub fn discard(&mut self) -> bool {
        self.inactivity.cancel();
        self.epoch += 1;
        self.session.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(branch: &str) -> Option<Attribution> {
        Some(Attribution::new("app", branch))
    }

    fn tracker() -> SessionTracker {
        SessionTracker::new(SessionConfig::default())
    }

    #[test]
    fn unresolvable_activity_stays_idle() {
        let mut tracker = tracker();
        assert!(tracker.observe(0, None, None).is_none());
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.inactivity_deadline(), None);
    }

    #[test]
    fn inactivity_after_last_activity_closes_session() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);
        tracker.observe(10_000, app("main"), None);

        assert_eq!(tracker.inactivity_deadline(), Some(40_000));
        assert!(tracker.expire(39_999).is_none());
        assert!(tracker.is_tracking());

        let entry = tracker.expire(40_000).expect("entry");
        assert_eq!(entry.repository, "app");
        assert_eq!(entry.branch, "main");
        assert_eq!(entry.duration, 40);
        assert_eq!(entry.start_time, 0);
        assert_eq!(entry.end_time, 40_000);
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn late_timer_does_not_credit_extra_idle_time() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        let entry = tracker.expire(3_600_000).expect("entry");
        assert_eq!(entry.end_time, 30_000);
        assert_eq!(entry.duration, 30);
    }

    #[test]
    fn short_session_is_discarded_on_branch_switch() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        let closed = tracker.observe(3_000, app("feature"), None);
        assert!(closed.is_none());

        let session = tracker.active_session().expect("new session");
        assert_eq!(session.attribution, Attribution::new("app", "feature"));
        assert_eq!(session.start_time, 3_000);
        assert_eq!(tracker.inactivity_deadline(), Some(33_000));
    }

    #[test]
    fn branch_switch_has_no_gap_or_overlap() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        let closed = tracker.observe(20_000, app("feature"), None).expect("entry");
        let session = tracker.active_session().expect("new session");

        assert_eq!(closed.end_time, 20_000);
        assert_eq!(session.start_time, closed.end_time);
        assert_eq!(closed.duration, 20);
    }

    #[test]
    fn failed_resolution_stops_tracking() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        let closed = tracker.observe(8_000, None, None).expect("entry");
        assert_eq!(closed.duration, 8);
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn exactly_min_duration_is_discarded() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);
        assert!(tracker.stop(5_000, StopReason::FocusLost).is_none());

        tracker.observe(10_000, app("main"), None);
        let entry = tracker.stop(15_001, StopReason::FocusLost).expect("entry");
        assert_eq!(entry.duration, 5);
    }

    #[test]
    fn stopping_idle_tracker_is_noop() {
        let mut tracker = tracker();
        assert!(tracker.stop(1_000, StopReason::Inactivity).is_none());
        assert!(tracker.expire(1_000).is_none());
    }

    #[test]
    fn focus_loss_and_timer_race_only_stop_once() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        let first = tracker.stop(31_000, StopReason::FocusLost);
        let second = tracker.expire(31_000);

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn interrupting_stops_bump_epoch() {
        let mut tracker = tracker();
        let start = tracker.epoch();

        tracker.observe(0, app("main"), None);
        tracker.stop(1_000, StopReason::AttributionChanged);
        assert_eq!(tracker.epoch(), start);

        tracker.stop(2_000, StopReason::FocusLost);
        assert_eq!(tracker.epoch(), start + 1);

        tracker.discard();
        assert_eq!(tracker.epoch(), start + 2);
    }

    #[test]
    fn clock_skew_never_yields_negative_duration() {
        let mut tracker = tracker();
        tracker.observe(50_000, app("main"), None);

        assert!(tracker.stop(10_000, StopReason::FocusLost).is_none());
    }

    #[test]
    fn files_are_carried_into_the_entry() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), Some("src/lib.rs".into()));
        tracker.observe(4_000, app("main"), Some("src/main.rs".into()));
        tracker.observe(6_000, app("main"), Some("src/lib.rs".into()));

        let entry = tracker.stop(9_000, StopReason::FocusLost).expect("entry");
        assert_eq!(entry.files, vec!["src/lib.rs", "src/main.rs"]);
    }

    #[test]
    fn discard_drops_session_without_entry() {
        let mut tracker = tracker();
        tracker.observe(0, app("main"), None);

        assert!(tracker.discard());
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.inactivity_deadline(), None);
        assert!(!tracker.discard());
    }
}
