//! Line-delimited JSON protocol between an editor host and `branchtime watch`.
//!
//! Each stdin line is one [`HostEvent`]. Activity and window events are
//! forwarded to the tracker; queries produce one [`HostResponse`] line.

use crate::tracker::{TrackerError, TrackerHandle, TrackerResult};
use anyhow::{Context, Result};
use branchtime_core::{BranchStats, SignalKind, TimeEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    DocumentChanged {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    DocumentSaved {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    DocumentOpened {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    ActiveEditorChanged {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    FocusChanged {
        focused: bool,
    },
    WorkspaceRoots {
        roots: Vec<PathBuf>,
    },
    Status,
    Repositories,
    Stats {
        repository: String,
    },
    TimeData,
    Flush,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "response", rename_all = "kebab-case")]
pub enum HostResponse {
    Status { status: String },
    Repositories { repositories: Vec<String> },
    Stats { repository: String, branches: BranchStats },
    TimeData { entries: Vec<TimeEntry> },
    Flush { written: bool },
    Reset,
    Error { message: String },
}

impl HostResponse {
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize host response")
    }
}

/// Parse one protocol line. Blank lines yield `None`.
pub fn parse_event(line: &str) -> Result<Option<HostEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let event = serde_json::from_str(line)
        .with_context(|| format!("Invalid host event: {}", line))?;
    Ok(Some(event))
}

/// Forward one event to the tracker, returning the answer to a query.
pub async fn dispatch(
    tracker: &TrackerHandle,
    event: HostEvent,
) -> TrackerResult<Option<HostResponse>> {
    let response = match event {
        HostEvent::DocumentChanged { path } => {
            tracker.signal(SignalKind::DocumentChanged, path)?;
            None
        }
        HostEvent::DocumentSaved { path } => {
            tracker.signal(SignalKind::DocumentSaved, path)?;
            None
        }
        HostEvent::DocumentOpened { path } => {
            tracker.signal(SignalKind::DocumentOpened, path)?;
            None
        }
        HostEvent::ActiveEditorChanged { path } => {
            tracker.signal(SignalKind::ActiveEditorChanged, path)?;
            None
        }
        HostEvent::FocusChanged { focused } => {
            tracker.focus_changed(focused)?;
            None
        }
        HostEvent::WorkspaceRoots { roots } => {
            tracker.workspace_roots_changed(roots)?;
            None
        }
        HostEvent::Status => Some(HostResponse::Status {
            status: tracker.current_status().await?,
        }),
        HostEvent::Repositories => Some(HostResponse::Repositories {
            repositories: tracker.repositories().await?,
        }),
        HostEvent::Stats { repository } => {
            let branches = tracker.stats_for_repository(&repository).await?;
            Some(HostResponse::Stats {
                repository,
                branches,
            })
        }
        HostEvent::TimeData => Some(HostResponse::TimeData {
            entries: tracker.time_data().await?,
        }),
        HostEvent::Flush => Some(HostResponse::Flush {
            written: tracker.flush().await?,
        }),
        HostEvent::Reset => {
            tracker.reset().await?;
            Some(HostResponse::Reset)
        }
    };

    Ok(response)
}

/// [`dispatch`] for a long-running host session: a storage failure becomes an
/// error response and tracking carries on. Only a disposed tracker is an
/// error here.
pub async fn respond(
    tracker: &TrackerHandle,
    event: HostEvent,
) -> TrackerResult<Option<HostResponse>> {
    match dispatch(tracker, event).await {
        Err(TrackerError::Store(e)) => {
            warn!("Storage error while handling host event: {}", e);
            Ok(Some(HostResponse::Error {
                message: e.to_string(),
            }))
        }
        other => other,
    }
}
