use chrono::Utc;
use tokio::time::Instant;

/// Source of "now" for the tracker, in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock epoch captured once, advanced by a monotonic instant.
///
/// Timestamps never go backwards when the system clock is adjusted, and they
/// follow tokio's paused clock in tests.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    base_ms: i64,
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    pub fn starting_at(base_ms: i64) -> Self {
        Self {
            base_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        self.base_ms + self.origin.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn advances_with_tokio_time() {
        let clock = MonotonicClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(clock.now_ms(), 3_500);
    }

    #[test]
    fn wall_clock_base_is_recent() {
        let before = Utc::now().timestamp_millis();
        let clock = MonotonicClock::new();
        assert!(clock.now_ms() >= before);
    }
}
