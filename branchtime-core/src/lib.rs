mod debounce;
mod session;
mod stats;
mod timer;
mod types;

pub use debounce::{coalesce, Debouncer, SignalKind};
pub use session::{SessionConfig, SessionTracker, StopReason};
pub use stats::{format_status, repositories, repository_totals, stats_for_repository, BranchStats};
pub use timer::Timer;
pub use types::{local_date, ActiveSession, Attribution, TimeEntry, MAX_SESSION_FILES};
