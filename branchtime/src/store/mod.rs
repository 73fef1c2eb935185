use async_trait::async_trait;
use branchtime_core::TimeEntry;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

pub const DATA_FILE_NAME: &str = "git-branch-time-data.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt time data in {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize time data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable home of the full entry history. Every save replaces the whole
/// history; readers never observe a partial write.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self) -> StoreResult<Vec<TimeEntry>>;

    async fn save(&self, entries: &[TimeEntry]) -> StoreResult<()>;

    /// Move unreadable content out of the way so the next save does not
    /// overwrite it. Returns where it went, if anywhere.
    async fn quarantine(&self) -> StoreResult<Option<PathBuf>> {
        Ok(None)
    }

    fn describe(&self) -> String;
}

/// Pretty-printed JSON array in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DATA_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> StoreResult<Vec<TimeEntry>> {
        // Bytes, not a String: invalid UTF-8 is corrupt content, not an IO error.
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No time data at {:?}", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, entries: &[TimeEntry]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        debug!("Wrote {} entries to {:?}", entries.len(), self.path);
        Ok(())
    }

    async fn quarantine(&self) -> StoreResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".corrupt-{}", stamp));
        let target = PathBuf::from(target);

        tokio::fs::rename(&self.path, &target).await?;
        warn!("Moved unreadable time data to {:?}", target);
        Ok(Some(target))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write through a temp file in the same directory and rename over the
/// target.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
