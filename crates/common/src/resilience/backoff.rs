//! Retry delay schedule.
//!
//! Delays are taken from an explicit list; retries beyond the end of the
//! list reuse the last entry. The reference schedule is 1s, 2s, 4s, 8s.

use std::time::Duration;

/// Fixed list of backoff delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_millis(&[1_000, 2_000, 4_000, 8_000])
    }
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(millis: &[u64]) -> Self {
        Self::new(millis.iter().copied().map(Duration::from_millis).collect())
    }

    /// Schedule with no delay between attempts.
    pub fn immediate() -> Self {
        Self::new(Vec::new())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let index = (retry as usize - 1).min(self.delays.len().saturating_sub(1));
        self.delays.get(index).copied().unwrap_or(Duration::ZERO)
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}
