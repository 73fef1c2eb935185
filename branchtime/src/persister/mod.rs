use crate::clock::Clock;
use crate::store::{Store, StoreError, StoreResult};
use branchtime_core::{TimeEntry, Timer};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Pending entries that force an immediate flush.
    pub batch_size: usize,
    /// Longest time the first unflushed entry waits for a flush.
    pub batch_window_ms: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_window_ms: 5_000,
        }
    }
}

/// Owns the full entry history and the batch of entries not yet written.
///
/// A flush happens when the batch reaches `batch_size` or when the window
/// started by the first unflushed entry elapses, whichever comes first. Each
/// flush rewrites the whole history through the [`Store`].
pub struct BatchPersister {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: BatchConfig,
    history: Vec<TimeEntry>,
    pending: Vec<TimeEntry>,
    flush_timer: Timer,
    writes: u64,
}

impl BatchPersister {
    /// Load the stored history. Unreadable data never fails startup: the
    /// persister starts empty and a corrupt file is moved aside first.
    pub async fn open(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: BatchConfig) -> Self {
        let history = match store.load().await {
            Ok(entries) => {
                info!("Loaded {} time entries from {}", entries.len(), store.describe());
                entries
            }
            Err(e) => {
                warn!("Failed to load time data, starting empty: {}", e);
                if matches!(e, StoreError::Corrupt { .. }) {
                    if let Err(e) = store.quarantine().await {
                        warn!("Failed to move corrupt time data aside: {}", e);
                    }
                }
                Vec::new()
            }
        };

        Self {
            store,
            clock,
            config,
            history,
            pending: Vec::new(),
            flush_timer: Timer::new(),
            writes: 0,
        }
    }

    pub async fn submit(&mut self, entry: TimeEntry) {
        debug!(
            "Queued {}s on {}/{}",
            entry.duration, entry.repository, entry.branch
        );
        self.pending.push(entry);

        if self.pending.len() >= self.config.batch_size {
            // Errors are logged in flush and the batch is kept for retry.
            let _ = self.flush().await;
        } else if !self.flush_timer.is_armed() {
            self.flush_timer
                .arm_after(self.clock.now_ms(), self.config.batch_window_ms);
        }
    }

    pub fn flush_deadline(&self) -> Option<i64> {
        self.flush_timer.deadline()
    }

    /// Flush if the batch window has elapsed.
    pub async fn on_timer(&mut self) {
        if self.flush_timer.fire(self.clock.now_ms()) {
            let _ = self.flush().await;
        }
    }

    /// Write history plus pending as one replacement of the stored data.
    /// Returns `Ok(false)` without touching the store when nothing is
    /// pending. On failure the batch stays pending and a retry is scheduled.
    pub async fn flush(&mut self) -> StoreResult<bool> {
        self.flush_timer.cancel();
        if self.pending.is_empty() {
            return Ok(false);
        }

        let flushed_from = self.history.len();
        self.history.append(&mut self.pending);

        match self.store.save(&self.history).await {
            Ok(()) => {
                self.writes += 1;
                info!(
                    "Flushed {} time entries ({} total)",
                    self.history.len() - flushed_from,
                    self.history.len()
                );
                Ok(true)
            }
            Err(e) => {
                self.pending = self.history.split_off(flushed_from);
                self.flush_timer
                    .arm_after(self.clock.now_ms(), self.config.batch_window_ms);
                warn!(
                    "Failed to write {} time entries to {}, will retry: {}",
                    self.pending.len(),
                    self.store.describe(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Persist an empty history, then forget all history and pending
    /// entries. If the write fails nothing in memory changes.
    pub async fn reset(&mut self) -> StoreResult<()> {
        if let Err(e) = self.store.save(&[]).await {
            warn!("Failed to reset time data in {}: {}", self.store.describe(), e);
            return Err(e);
        }
        self.writes += 1;

        self.flush_timer.cancel();
        let dropped = self.history.len() + self.pending.len();
        self.history.clear();
        self.pending.clear();
        info!("Reset time data, dropped {} entries", dropped);
        Ok(())
    }

    /// Final flush before shutdown.
    pub async fn dispose(&mut self) -> StoreResult<bool> {
        self.flush().await
    }

    /// History followed by pending entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &TimeEntry> {
        self.history.iter().chain(self.pending.iter())
    }

    pub fn time_data(&self) -> Vec<TimeEntry> {
        self.entries().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}
