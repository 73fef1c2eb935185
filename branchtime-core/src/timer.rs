/// A single cancellable deadline in epoch milliseconds.
///
/// Each purpose (inactivity, batch flush, debounce window, initial check)
/// owns its own `Timer`, so at most one deadline per purpose is ever armed.
/// The timer does not sleep by itself; the owning event loop asks for the
/// deadline and reports back when it has been reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<i64>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer to fire at `at_ms`, replacing any previous deadline.
    pub fn arm(&mut self, at_ms: i64) {
        self.deadline = Some(at_ms);
    }

    pub fn arm_after(&mut self, now_ms: i64, delay_ms: i64) {
        self.arm(now_ms.saturating_add(delay_ms.max(0)));
    }

    /// Returns true if a deadline was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        matches!(self.deadline, Some(at) if now_ms >= at)
    }

    /// Disarm and return true when the deadline has been reached.
    pub fn fire(&mut self, now_ms: i64) -> bool {
        if self.is_due(now_ms) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}
