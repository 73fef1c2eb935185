// Library interface for the branchtime binary and integration tests

pub mod clock;
pub mod host;
pub mod persister;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod tracker;

pub use branchtime_core::{Attribution, BranchStats, SignalKind, TimeEntry};
