//! Job poller
//!
//! Drives a server-side asynchronous job from initiation to a terminal
//! status. The loop is bounded by `max_attempts` polls spaced by a fixed
//! interval and can be stopped at any point through a `CancellationToken`.
//!
//! Termination is decided only by the reported status and the attempt
//! budget. Stage indices handed to observers come from a [`StageEstimator`]
//! and carry no meaning for the loop itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cvforge_domain::{
    JobConfig, JobProgress, JobSession, JobStatus, JobStatusReport, JobTicket, StageDefinition,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::{AttemptBandEstimator, JobObserver, PollFailure, StageEstimator};

/// Job-level failures, distinct from one another and from transport errors
#[derive(Debug, Error)]
pub enum JobError<E>
where
    E: std::error::Error + 'static,
{
    /// Initiation succeeded at the transport level but returned no session id
    #[error("the job did not start: no session id was returned")]
    NotStarted,

    /// The backend reported `status = error`
    #[error("the job failed: {message}")]
    Failed { session_id: String, message: String },

    /// The attempt budget ran out before a terminal status
    #[error("the job took too long to finish ({attempts} status checks)")]
    TimedOut { session_id: String, attempts: u32 },

    #[error("the job was cancelled")]
    Cancelled,

    /// Initiation failed, or a poll failed with an error that aborts the job
    #[error(transparent)]
    Request(E),
}

impl<E: std::error::Error + 'static> JobError<E> {
    /// Message suitable for direct display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotStarted => "The job could not be started. Please try again.".to_string(),
            Self::Failed { message, .. } => message.clone(),
            Self::TimedOut { .. } => {
                "This is taking longer than expected. Please try again in a few minutes."
                    .to_string()
            }
            Self::Cancelled => "The job was cancelled.".to_string(),
            Self::Request(err) => err.to_string(),
        }
    }
}

/// Poll budget and spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self { max_attempts: 60, poll_interval: Duration::from_secs(2) }
    }
}

impl From<&JobConfig> for JobOptions {
    fn from(config: &JobConfig) -> Self {
        Self { max_attempts: config.max_attempts, poll_interval: config.poll_interval() }
    }
}

/// Drives jobs through initiate → poll → terminal status
#[derive(Clone)]
pub struct JobPoller {
    options: JobOptions,
    estimator: Arc<dyn StageEstimator>,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller").field("options", &self.options).finish_non_exhaustive()
    }
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(JobOptions::default())
    }
}

impl JobPoller {
    pub fn new(options: JobOptions) -> Self {
        Self { options, estimator: Arc::new(AttemptBandEstimator::default()) }
    }

    /// Replace the attempt-to-stage heuristic.
    pub fn with_estimator(mut self, estimator: Arc<dyn StageEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn options(&self) -> JobOptions {
        self.options
    }

    /// Run one job to completion.
    ///
    /// `initiate` is called exactly once. `poll_status` is called at most
    /// `max_attempts` times with the issued session id. Poll failures are
    /// retried on the next interval unless [`PollFailure::aborts_job`] says
    /// otherwise.
    ///
    /// # Errors
    /// - [`JobError::NotStarted`] when the ticket carries no session id
    /// - [`JobError::Failed`] when the backend reports `error`
    /// - [`JobError::TimedOut`] when the budget is spent
    /// - [`JobError::Cancelled`] when `cancel` fires
    /// - [`JobError::Request`] when initiation fails
    pub async fn run_job<E, I, IFut, P, PFut>(
        &self,
        initiate: I,
        mut poll_status: P,
        stages: &[StageDefinition],
        observer: Option<&dyn JobObserver>,
        cancel: &CancellationToken,
    ) -> Result<JobStatusReport, JobError<E>>
    where
        E: std::error::Error + PollFailure + 'static,
        I: FnOnce() -> IFut,
        IFut: Future<Output = Result<JobTicket, E>>,
        P: FnMut(String) -> PFut,
        PFut: Future<Output = Result<JobStatusReport, E>>,
    {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let ticket = initiate().await.map_err(JobError::Request)?;
        let session_id = ticket.session_id().ok_or(JobError::NotStarted)?.to_string();
        let mut session = JobSession::new(session_id, self.options.max_attempts);
        info!(session_id = %session.session_id, max_attempts = session.max_attempts, "Job started");

        loop {
            if cancel.is_cancelled() {
                info!(session_id = %session.session_id, attempt = session.attempt, "Job polling cancelled");
                return Err(JobError::Cancelled);
            }
            if !session.begin_attempt() {
                return Err(self.timed_out(&session));
            }

            match poll_status(session.session_id.clone()).await {
                Ok(report) => match session.observe(report.status) {
                    JobStatus::Completed => {
                        info!(session_id = %session.session_id, attempt = session.attempt, "Job completed");
                        return Ok(report);
                    }
                    JobStatus::Error => {
                        let message = report.failure_message();
                        warn!(session_id = %session.session_id, error = %message, "Job reported failure");
                        return Err(JobError::Failed { session_id: session.session_id, message });
                    }
                    status => {
                        session.stage_index = self.estimator.stage_for(session.attempt, stages.len());
                        debug!(
                            session_id = %session.session_id,
                            attempt = session.attempt,
                            stage = session.stage_index,
                            %status,
                            "Job still running"
                        );
                        if let Some(observer) = observer {
                            observer.on_progress(&progress(&session, stages));
                        }
                    }
                },
                Err(err) if err.aborts_job() => {
                    warn!(session_id = %session.session_id, error = %err, "Job polling aborted");
                    return Err(JobError::Request(err));
                }
                Err(err) => {
                    warn!(
                        session_id = %session.session_id,
                        attempt = session.attempt,
                        error = %err,
                        "Job status poll failed, retrying next interval"
                    );
                }
            }

            if session.attempts_exhausted() {
                return Err(self.timed_out(&session));
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    info!(session_id = %session.session_id, attempt = session.attempt, "Job polling cancelled");
                    return Err(JobError::Cancelled);
                }
                () = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    fn timed_out<E: std::error::Error + 'static>(&self, session: &JobSession) -> JobError<E> {
        warn!(session_id = %session.session_id, attempts = session.attempt, "Job timed out");
        JobError::TimedOut { session_id: session.session_id.clone(), attempts: session.attempt }
    }
}

fn progress(session: &JobSession, stages: &[StageDefinition]) -> JobProgress {
    JobProgress {
        session_id: session.session_id.clone(),
        attempt: session.attempt,
        max_attempts: session.max_attempts,
        stage_index: session.stage_index,
        stage: session.stage_index.checked_sub(1).and_then(|i| stages.get(i)).cloned(),
        status: session.status,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Error)]
    #[error("stub failure (fatal: {fatal})")]
    struct StubError {
        fatal: bool,
    }

    impl PollFailure for StubError {
        fn aborts_job(&self) -> bool {
            self.fatal
        }
    }

    fn stages() -> Vec<StageDefinition> {
        vec![
            StageDefinition::new("analyze", "Analyzing your CV"),
            StageDefinition::new("match", "Matching the job description"),
            StageDefinition::new("rewrite", "Rewriting sections"),
            StageDefinition::new("polish", "Polishing"),
        ]
    }

    fn poller(max_attempts: u32) -> JobPoller {
        JobPoller::new(JobOptions { max_attempts, poll_interval: Duration::from_secs(2) })
    }

    async fn ticket(id: &str) -> Result<JobTicket, StubError> {
        Ok(JobTicket { session_id: Some(id.to_string()) })
    }

    #[tokio::test(start_paused = true)]
    async fn always_processing_times_out_after_budget() {
        let polls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = poller(60)
            .run_job(
                || ticket("abc"),
                |_id| {
                    polls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, StubError>(JobStatusReport::new(JobStatus::Processing)) }
                },
                &stages(),
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(JobError::TimedOut { attempts: 60, .. })));
        assert_eq!(polls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_pending_polls_and_reports_stages() {
        let script = Mutex::new(VecDeque::from([
            JobStatus::Pending,
            JobStatus::Pending,
            JobStatus::Completed,
        ]));
        let polls = AtomicU32::new(0);
        let seen = Mutex::new(Vec::new());
        let observer = |progress: &JobProgress| {
            seen.lock().unwrap().push((progress.attempt, progress.stage_index));
        };
        let cancel = CancellationToken::new();

        let report = poller(60)
            .run_job(
                || ticket("abc"),
                |id| {
                    assert_eq!(id, "abc");
                    polls.fetch_add(1, Ordering::SeqCst);
                    let status = script.lock().unwrap().pop_front().unwrap();
                    async move {
                        Ok::<_, StubError>(
                            JobStatusReport::new(status)
                                .with_field("rewritten_cv", serde_json::json!({"summary": "ok"})),
                        )
                    }
                },
                &stages(),
                Some(&observer),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert!(report.fields.contains_key("rewritten_cv"));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (2, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_session_id_never_polls() {
        let polls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = poller(60)
            .run_job(
                || async { Ok::<_, StubError>(JobTicket::default()) },
                |_id| {
                    polls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, StubError>(JobStatusReport::new(JobStatus::Completed)) }
                },
                &stages(),
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(JobError::NotStarted)));
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_surfaces_message() {
        let cancel = CancellationToken::new();
        let result = poller(60)
            .run_job(
                || ticket("abc"),
                |_id| async {
                    let mut report = JobStatusReport::new(JobStatus::Error);
                    report.error = Some("The model could not parse the CV".into());
                    Ok::<_, StubError>(report)
                },
                &stages(),
                None,
                &cancel,
            )
            .await;

        match result {
            Err(JobError::Failed { session_id, message }) => {
                assert_eq!(session_id, "abc");
                assert_eq!(message, "The model could not parse the CV");
            }
            other => panic!("expected job failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_use_the_same_budget() {
        let polls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let report = poller(5)
            .run_job(
                || ticket("abc"),
                |_id| {
                    let n = polls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(StubError { fatal: false })
                        } else {
                            Ok(JobStatusReport::new(JobStatus::Completed))
                        }
                    }
                },
                &stages(),
                None,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(polls.load(Ordering::SeqCst), 3);

        let polls = AtomicU32::new(0);
        let result = poller(4)
            .run_job(
                || ticket("abc"),
                |_id| {
                    polls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<JobStatusReport, _>(StubError { fatal: false }) }
                },
                &stages(),
                None,
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(JobError::TimedOut { attempts: 4, .. })));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn aborting_poll_error_stops_the_job() {
        let polls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = poller(60)
            .run_job(
                || ticket("abc"),
                |_id| {
                    polls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<JobStatusReport, _>(StubError { fatal: true }) }
                },
                &stages(),
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(JobError::Request(StubError { fatal: true }))));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initiation_error_is_a_request_error() {
        let cancel = CancellationToken::new();
        let result = poller(60)
            .run_job(
                || async { Err::<JobTicket, _>(StubError { fatal: false }) },
                |_id| async { Ok::<_, StubError>(JobStatusReport::new(JobStatus::Completed)) },
                &stages(),
                None,
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(JobError::Request(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let polls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let result = poller(60)
            .run_job(
                || ticket("abc"),
                |_id| {
                    if polls.fetch_add(1, Ordering::SeqCst) == 2 {
                        trigger.cancel();
                    }
                    async { Ok::<_, StubError>(JobStatusReport::new(JobStatus::Processing)) }
                },
                &stages(),
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(JobError::Cancelled)));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_never_regresses_in_progress_reports() {
        let script = Mutex::new(VecDeque::from([
            JobStatus::Processing,
            JobStatus::Pending,
            JobStatus::Completed,
        ]));
        let seen = Mutex::new(Vec::new());
        let observer = |progress: &JobProgress| seen.lock().unwrap().push(progress.status);
        let cancel = CancellationToken::new();

        poller(10)
            .run_job(
                || ticket("abc"),
                |_id| {
                    let status = script.lock().unwrap().pop_front().unwrap();
                    async move { Ok::<_, StubError>(JobStatusReport::new(status)) }
                },
                &stages(),
                Some(&observer),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![JobStatus::Processing, JobStatus::Processing]);
    }

    #[test]
    fn options_follow_job_config() {
        let options = JobOptions::from(&JobConfig::default());
        assert_eq!(options, JobOptions::default());
    }
}
