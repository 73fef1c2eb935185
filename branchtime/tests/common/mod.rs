#![allow(dead_code)]

use async_trait::async_trait;
use branchtime::clock::MonotonicClock;
use branchtime::resolver::Resolver;
use branchtime::store::{Store, StoreError, StoreResult};
use branchtime::tracker::{TrackerConfig, TrackerHandle, TrackerService};
use branchtime::{Attribution, TimeEntry};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Resolver whose answer and latency the test controls.
#[derive(Default)]
pub struct ScriptedResolver {
    answer: Mutex<Option<Attribution>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    last_path: Mutex<Option<PathBuf>>,
}

impl ScriptedResolver {
    pub fn on(repository: &str, branch: &str) -> Arc<Self> {
        let resolver = Self::default();
        resolver.switch(repository, branch);
        Arc::new(resolver)
    }

    pub fn switch(&self, repository: &str, branch: &str) {
        *self.answer.lock() = Some(Attribution::new(repository, branch));
    }

    pub fn outside_repository(&self) {
        *self.answer.lock() = None;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().clone()
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, path: &Path) -> Option<Attribution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock() = Some(path.to_path_buf());

        // Answer as of the call, not as of completion.
        let answer = self.answer.lock().clone();
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

/// In-memory store recording every write.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<TimeEntry>>,
    writes: AtomicUsize,
    fail: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_entries(entries: Vec<TimeEntry>) -> Arc<Self> {
        let store = Self::default();
        *store.entries.lock() = entries;
        Arc::new(store)
    }

    pub fn entries(&self) -> Vec<TimeEntry> {
        self.entries.lock().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> StoreResult<Vec<TimeEntry>> {
        Ok(self.entries.lock().clone())
    }

    async fn save(&self, entries: &[TimeEntry]) -> StoreResult<()> {
        if *self.fail.lock() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        *self.entries.lock() = entries.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Timings that make scenario arithmetic exact: no debounce and an
/// immediate startup check.
pub fn instant_config() -> TrackerConfig {
    TrackerConfig {
        debounce_ms: 0,
        initial_check_delay_ms: 0,
        ..TrackerConfig::default()
    }
}

/// Start a service on a clock reading 0 at the current (paused) instant.
pub async fn start(
    config: TrackerConfig,
    resolver: Arc<ScriptedResolver>,
    store: Arc<MemoryStore>,
) -> TrackerHandle {
    TrackerService::start(
        config,
        vec![PathBuf::from("/work/app")],
        resolver,
        store,
        Arc::new(MonotonicClock::starting_at(0)),
    )
    .await
}

pub fn source(name: &str) -> Option<PathBuf> {
    Some(PathBuf::from("/work/app/src").join(name))
}

pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
