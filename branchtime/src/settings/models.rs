use crate::persister::BatchConfig;
use crate::tracker::TrackerConfig;
use anyhow::{Context, Result};
use branchtime_core::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Settings {
    pub fn tracker_config(&self) -> TrackerConfig {
        let tracking = &self.tracking;

        TrackerConfig {
            session: SessionConfig {
                inactivity_threshold_ms: secs_to_ms(tracking.inactivity_threshold_secs),
                min_session_ms: secs_to_ms(tracking.min_session_secs),
            },
            debounce_ms: tracking.debounce_ms as i64,
            initial_check_delay_ms: tracking.initial_check_delay_ms as i64,
            resolver_timeout: Duration::from_secs(tracking.resolver_timeout_secs.max(1)),
            batch: BatchConfig {
                batch_size: self.storage.batch_size.max(1),
                batch_window_ms: secs_to_ms(self.storage.batch_window_secs),
            },
        }
    }

    /// Directory holding the time data file. `~` is expanded.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.storage.data_dir.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let expanded = shellexpand::tilde(raw.trim());
                Ok(PathBuf::from(expanded.as_ref()))
            }
            _ => {
                let data_dir = dirs::data_dir().context("Could not find data directory")?;
                Ok(data_dir.join("branchtime"))
            }
        }
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    (secs as i64).saturating_mul(1000)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,

    #[serde(default = "default_min_session_secs")]
    pub min_session_secs: u64,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_initial_check_delay_ms")]
    pub initial_check_delay_ms: u64,

    #[serde(default = "default_resolver_timeout_secs")]
    pub resolver_timeout_secs: u64,

    /// Branch credited when HEAD is detached.
    #[serde(default = "default_detached_branch")]
    pub detached_branch: String,
}

fn default_inactivity_threshold_secs() -> u64 {
    30
}

fn default_min_session_secs() -> u64 {
    5
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_initial_check_delay_ms() -> u64 {
    1000
}

fn default_resolver_timeout_secs() -> u64 {
    5
}

fn default_detached_branch() -> String {
    "main".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            min_session_secs: default_min_session_secs(),
            debounce_ms: default_debounce_ms(),
            initial_check_delay_ms: default_initial_check_delay_ms(),
            resolver_timeout_secs: default_resolver_timeout_secs(),
            detached_branch: default_detached_branch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_window_secs")]
    pub batch_window_secs: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_window_secs() -> u64 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            batch_size: default_batch_size(),
            batch_window_secs: default_batch_window_secs(),
        }
    }
}
