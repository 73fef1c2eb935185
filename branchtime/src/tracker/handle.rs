use super::Command;
use crate::store::StoreError;
use branchtime_core::{BranchStats, SignalKind, TimeEntry};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker has been disposed")]
    Disposed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Cloneable entry point to a running [`TrackerService`](super::TrackerService).
///
/// Every call is queued to the service task and handled in order. Once the
/// service is disposed every call fails with [`TrackerError::Disposed`].
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl TrackerHandle {
    pub(super) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Report raw editor activity. `path` is the document involved, if any.
    pub fn signal(&self, kind: SignalKind, path: Option<PathBuf>) -> TrackerResult<()> {
        self.send(Command::Signal { kind, path })
    }

    pub fn focus_changed(&self, focused: bool) -> TrackerResult<()> {
        self.send(Command::FocusChanged(focused))
    }

    pub fn workspace_roots_changed(&self, roots: Vec<PathBuf>) -> TrackerResult<()> {
        self.send(Command::WorkspaceRoots(roots))
    }

    /// Every recorded entry, flushed or not.
    pub async fn time_data(&self) -> TrackerResult<Vec<TimeEntry>> {
        self.request(Command::TimeData).await
    }

    pub async fn repositories(&self) -> TrackerResult<Vec<String>> {
        self.request(Command::Repositories).await
    }

    pub async fn stats_for_repository(&self, repository: &str) -> TrackerResult<BranchStats> {
        let repository = repository.to_string();
        self.request(|reply| Command::Stats { repository, reply })
            .await
    }

    pub async fn current_status(&self) -> TrackerResult<String> {
        self.request(Command::Status).await
    }

    /// Write pending entries now. Returns whether anything was written.
    pub async fn flush(&self) -> TrackerResult<bool> {
        Ok(self.request(Command::Flush).await??)
    }

    /// Discard the active session and erase all history.
    pub async fn reset(&self) -> TrackerResult<()> {
        Ok(self.request(Command::Reset).await??)
    }

    /// Stop tracking, flush and shut the service down. Later calls on any
    /// clone of this handle fail.
    pub async fn dispose(&self) -> TrackerResult<()> {
        self.request(Command::Dispose).await??;
        Ok(())
    }

    fn send(&self, command: Command) -> TrackerResult<()> {
        self.commands
            .send(command)
            .map_err(|_| TrackerError::Disposed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> TrackerResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response.await.map_err(|_| TrackerError::Disposed)
    }
}
