//! The tracker service: one task that owns the session state machine, the
//! debouncer and the batch persister.
//!
//! Everything that changes tracking state (host commands, timer deadlines,
//! resolver completions) is handled one at a time by [`TrackerService::run`].
//! Resolver calls are the only work done off the task. Each carries a
//! sequence number and the tracker epoch it was started under, and its result
//! is dropped if either is out of date by the time it comes back.

mod handle;
mod workspace;

pub use handle::{TrackerError, TrackerHandle, TrackerResult};
pub use workspace::{containing_root, resolution_target};

use crate::clock::Clock;
use crate::persister::{BatchConfig, BatchPersister};
use crate::resolver::Resolver;
use crate::store::{Store, StoreResult};
use branchtime_core::{
    format_status, repositories, stats_for_repository, Attribution, BranchStats, Debouncer,
    SessionConfig, SessionTracker, SignalKind, StopReason, TimeEntry, Timer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub session: SessionConfig,
    pub debounce_ms: i64,
    /// Delay before the activity check made at startup and after every
    /// workspace roots change.
    pub initial_check_delay_ms: i64,
    pub resolver_timeout: Duration,
    pub batch: BatchConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            debounce_ms: 300,
            initial_check_delay_ms: 1_000,
            resolver_timeout: Duration::from_secs(5),
            batch: BatchConfig::default(),
        }
    }
}

pub(crate) enum Command {
    Signal {
        kind: SignalKind,
        path: Option<PathBuf>,
    },
    FocusChanged(bool),
    WorkspaceRoots(Vec<PathBuf>),
    TimeData(oneshot::Sender<Vec<TimeEntry>>),
    Repositories(oneshot::Sender<Vec<String>>),
    Stats {
        repository: String,
        reply: oneshot::Sender<BranchStats>,
    },
    Status(oneshot::Sender<String>),
    Flush(oneshot::Sender<StoreResult<bool>>),
    Reset(oneshot::Sender<StoreResult<()>>),
    Dispose(oneshot::Sender<StoreResult<bool>>),
}

/// Identity of one resolver call.
#[derive(Debug, Clone)]
struct Ticket {
    seq: u64,
    epoch: u64,
    file: Option<String>,
}

struct Resolution {
    ticket: Ticket,
    attribution: Option<Attribution>,
}

pub struct TrackerService {
    config: TrackerConfig,
    roots: Vec<PathBuf>,
    resolver: Arc<dyn Resolver>,
    clock: Arc<dyn Clock>,
    tracker: SessionTracker,
    debouncer: Debouncer<SignalKind, Option<PathBuf>>,
    persister: BatchPersister,
    initial_check: Timer,
    focused: bool,
    resolutions: JoinSet<Resolution>,
    next_seq: u64,
    applied_seq: u64,
    disposed: bool,
}

impl TrackerService {
    /// Load stored history and spawn the service task. The first activity
    /// check runs `initial_check_delay_ms` after this call.
    pub async fn start(
        config: TrackerConfig,
        roots: Vec<PathBuf>,
        resolver: Arc<dyn Resolver>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> TrackerHandle {
        let persister = BatchPersister::open(store, clock.clone(), config.batch).await;

        let mut initial_check = Timer::new();
        initial_check.arm_after(clock.now_ms(), config.initial_check_delay_ms);

        let service = Self {
            config,
            roots,
            resolver,
            tracker: SessionTracker::new(config.session),
            debouncer: Debouncer::new(config.debounce_ms),
            persister,
            initial_check,
            focused: true,
            resolutions: JoinSet::new(),
            next_seq: 0,
            applied_seq: 0,
            disposed: false,
            clock,
        };

        let (commands, receiver) = mpsc::unbounded_channel();
        info!(
            "Starting tracker ({} workspace roots, inactivity {}s)",
            service.roots.len(),
            config.session.inactivity_threshold_ms / 1000
        );
        tokio::spawn(service.run(receiver));

        TrackerHandle::new(commands)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let delay = self.next_delay();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All tracker handles dropped");
                        let _ = self.dispose().await;
                        break;
                    }
                },
                Some(joined) = self.resolutions.join_next(), if !self.resolutions.is_empty() => {
                    self.apply_resolution(joined).await;
                }
                _ = sleep_for(delay) => self.on_deadline().await,
            }
        }

        info!("Tracker stopped");
    }

    fn next_delay(&self) -> Option<Duration> {
        let deadline = [
            self.tracker.inactivity_deadline(),
            self.persister.flush_deadline(),
            self.debouncer.next_deadline(),
            self.initial_check.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()?;

        let delay = deadline.saturating_sub(self.clock.now_ms()).max(0);
        Some(Duration::from_millis(delay as u64))
    }

    /// Returns `false` once the service has been disposed.
    async fn handle_command(&mut self, command: Command) -> bool {
        if self.disposed {
            return false;
        }
        let now = self.clock.now_ms();

        match command {
            Command::Signal { kind, path } => {
                debug!("Signal {} {:?}", kind.as_str(), path);
                self.debouncer.push(kind, path, now);
            }
            Command::FocusChanged(true) => {
                debug!("Window focused");
                self.focused = true;
            }
            Command::FocusChanged(false) => {
                self.focused = false;
                // Only real activity starts a session once focus is gone.
                self.initial_check.cancel();
                let dropped = self.debouncer.clear();
                if dropped > 0 {
                    debug!("Dropped {} pending signals on focus loss", dropped);
                }
                self.stop(now, StopReason::FocusLost).await;
            }
            Command::WorkspaceRoots(roots) => {
                info!("Workspace roots changed: {:?}", roots);
                self.roots = roots;
                if self.focused {
                    self.initial_check
                        .arm_after(now, self.config.initial_check_delay_ms);
                }
            }
            Command::TimeData(reply) => {
                let _ = reply.send(self.persister.time_data());
            }
            Command::Repositories(reply) => {
                let _ = reply.send(repositories(self.persister.entries()));
            }
            Command::Stats { repository, reply } => {
                let _ = reply.send(stats_for_repository(self.persister.entries(), &repository));
            }
            Command::Status(reply) => {
                let _ = reply.send(format_status(self.tracker.active_session(), now));
            }
            Command::Flush(reply) => {
                let _ = reply.send(self.persister.flush().await);
            }
            Command::Reset(reply) => {
                if self.tracker.discard() {
                    debug!("Discarded active session on reset");
                }
                let _ = reply.send(self.persister.reset().await);
            }
            Command::Dispose(reply) => {
                let _ = reply.send(self.dispose().await);
                return false;
            }
        }

        true
    }

    async fn on_deadline(&mut self) {
        if self.disposed {
            return;
        }
        let now = self.clock.now_ms();

        for (_, kind, path) in self.debouncer.take_due(now) {
            debug!("Activity from {}", kind.as_str());
            self.begin_activity(path);
        }

        if self.initial_check.fire(now) {
            debug!("Running activity check");
            self.begin_activity(None);
        }

        if let Some(entry) = self.tracker.expire(now) {
            info!("Session on {}/{} ended after inactivity", entry.repository, entry.branch);
            self.persister.submit(entry).await;
        }

        self.persister.on_timer().await;
    }

    /// Start resolving the attribution of one coalesced activity.
    fn begin_activity(&mut self, path: Option<PathBuf>) {
        let target = resolution_target(&self.roots, path.as_deref());

        self.next_seq += 1;
        let ticket = Ticket {
            seq: self.next_seq,
            epoch: self.tracker.epoch(),
            file: path.as_deref().map(|p| display_file(&self.roots, p)),
        };

        let resolver = self.resolver.clone();
        let timeout = self.config.resolver_timeout;

        self.resolutions.spawn(async move {
            let attribution = match target {
                Some(dir) => resolve_with_timeout(resolver.as_ref(), &dir, timeout).await,
                None => None,
            };
            Resolution {
                ticket,
                attribution,
            }
        });
    }

    async fn apply_resolution(&mut self, joined: Result<Resolution, JoinError>) {
        let resolution = match joined {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Resolver task failed: {}", e);
                return;
            }
        };
        let ticket = resolution.ticket;

        if self.disposed {
            return;
        }
        if ticket.epoch != self.tracker.epoch() {
            debug!("Dropping resolution #{} from before an interruption", ticket.seq);
            return;
        }
        if ticket.seq <= self.applied_seq {
            debug!("Dropping stale resolution #{}", ticket.seq);
            return;
        }
        self.applied_seq = ticket.seq;

        let now = self.clock.now_ms();
        let was = self.tracker.active_session().map(|s| s.attribution.clone());

        let closed = self
            .tracker
            .observe(now, resolution.attribution.clone(), ticket.file);

        if was != resolution.attribution {
            match &resolution.attribution {
                Some(attribution) => info!("Tracking {}", attribution),
                None if was.is_some() => info!("Activity outside any repository, tracking stopped"),
                None => {}
            }
        }

        if let Some(entry) = closed {
            self.persister.submit(entry).await;
        }
    }

    async fn stop(&mut self, now: i64, reason: StopReason) {
        if let Some(entry) = self.tracker.stop(now, reason) {
            info!(
                "Session on {}/{} stopped ({:?}, {}s)",
                entry.repository, entry.branch, reason, entry.duration
            );
            self.persister.submit(entry).await;
        }
    }

    async fn dispose(&mut self) -> StoreResult<bool> {
        if self.disposed {
            return Ok(false);
        }
        self.disposed = true;

        let now = self.clock.now_ms();
        self.stop(now, StopReason::Disposed).await;
        self.debouncer.clear();
        self.initial_check.cancel();

        let mut dropped = 0;
        while self.resolutions.join_next().await.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} in-flight resolutions", dropped);
        }

        self.persister.dispose().await
    }
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

async fn resolve_with_timeout(
    resolver: &dyn Resolver,
    dir: &Path,
    timeout: Duration,
) -> Option<Attribution> {
    match tokio::time::timeout(timeout, resolver.resolve(dir)).await {
        Ok(attribution) => attribution,
        Err(_) => {
            warn!("Resolving {} timed out after {:?}", dir.display(), timeout);
            None
        }
    }
}

/// File name recorded on the session: relative to its workspace root when
/// there is one.
fn display_file(roots: &[PathBuf], path: &Path) -> String {
    containing_root(roots, path)
        .and_then(|root| path.strip_prefix(root).ok())
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}
