//! Port interfaces for job progress reporting

use cvforge_domain::JobProgress;

/// Receives progress after every non-terminal poll
pub trait JobObserver: Send + Sync {
    fn on_progress(&self, progress: &JobProgress);
}

impl<F> JobObserver for F
where
    F: Fn(&JobProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &JobProgress) {
        self(progress);
    }
}

/// Maps a poll attempt to a 1-based UI stage index
///
/// The backend reports no fine-grained progress, so the stage shown to the
/// user is a heartbeat derived from elapsed attempts. It never influences
/// termination.
pub trait StageEstimator: Send + Sync {
    /// Stage for `attempt` (1-based) out of `stage_count` declared stages.
    /// Returns 0 when no stages are declared.
    fn stage_for(&self, attempt: u32, stage_count: usize) -> usize;
}

/// Coarse attempt bands: 1-5 → 1, 6-15 → 2, 16-30 → 3, beyond → 4
#[derive(Debug, Clone)]
pub struct AttemptBandEstimator {
    /// Last attempt (inclusive) of each band; stage N+1 covers the rest
    band_ends: Vec<u32>,
}

impl Default for AttemptBandEstimator {
    fn default() -> Self {
        Self { band_ends: vec![5, 15, 30] }
    }
}

impl AttemptBandEstimator {
    pub fn new(band_ends: Vec<u32>) -> Self {
        Self { band_ends }
    }
}

impl StageEstimator for AttemptBandEstimator {
    fn stage_for(&self, attempt: u32, stage_count: usize) -> usize {
        if stage_count == 0 {
            return 0;
        }
        let band = self.band_ends.iter().take_while(|end| attempt > **end).count() + 1;
        band.min(stage_count)
    }
}

/// Classifies poll failures the poller cannot recover from
///
/// Transport failures are retried on the next interval by default; an error
/// type can opt into aborting the job (for example once the session is gone).
pub trait PollFailure {
    fn aborts_job(&self) -> bool {
        false
    }
}
