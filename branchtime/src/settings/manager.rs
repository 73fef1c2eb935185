use super::models::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct SettingsManager {
    config_path: PathBuf,
    settings: Arc<RwLock<Settings>>,
}

impl SettingsManager {
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(Self::get_config_path()?))
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self {
            config_path,
            settings: Arc::new(RwLock::new(Settings::default())),
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;

        let branchtime_dir = config_dir.join("branchtime");
        std::fs::create_dir_all(&branchtime_dir)
            .context("Failed to create branchtime config directory")?;

        Ok(branchtime_dir.join("settings.yaml"))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings from disk. On first run the defaults are written out so
    /// they can be edited.
    pub async fn load(&self) -> Result<()> {
        if !self.config_path.exists() {
            info!("No existing settings file found, writing defaults");
            return self.save(Settings::default()).await;
        }

        let contents = tokio::fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read settings file")?;

        let settings: Settings =
            serde_yaml::from_str(&contents).context("Failed to parse YAML settings")?;

        Self::validate(&settings);

        let mut current = self.settings.write().await;
        *current = settings;

        info!("Settings loaded from {:?}", self.config_path);
        Ok(())
    }

    pub async fn save(&self, settings: Settings) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create settings directory")?;
        }

        let yaml_string =
            serde_yaml::to_string(&settings).context("Failed to serialize settings to YAML")?;

        tokio::fs::write(&self.config_path, yaml_string)
            .await
            .context("Failed to write settings file")?;

        let mut current = self.settings.write().await;
        *current = settings;

        info!("Settings saved to {:?}", self.config_path);
        Ok(())
    }

    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Warn about values that are accepted but adjusted at runtime.
    fn validate(settings: &Settings) {
        if settings.storage.batch_size == 0 {
            warn!("storage.batch_size is 0, flushing after every entry instead");
        }
        if settings.tracking.resolver_timeout_secs == 0 {
            warn!("tracking.resolver_timeout_secs is 0, using 1 second");
        }
        if settings.tracking.min_session_secs >= settings.tracking.inactivity_threshold_secs {
            warn!(
                "tracking.min_session_secs ({}) is not below the inactivity threshold ({}); \
                 sessions ended by inactivity alone will never be recorded",
                settings.tracking.min_session_secs, settings.tracking.inactivity_threshold_secs
            );
        }
        if settings.tracking.detached_branch.trim().is_empty() {
            warn!("tracking.detached_branch is empty; detached HEADs will be credited to ''");
        }
    }
}
