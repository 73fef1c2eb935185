mod manager;
mod models;

pub use manager::SettingsManager;
pub use models::{Settings, StorageConfig, TrackingConfig};
