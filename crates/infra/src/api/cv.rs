//! CV upload and rewrite operations
//!
//! The rewrite is an asynchronous backend job: one initiation call returns a
//! `session_id`, then the status endpoint is polled until a terminal status.

use cvforge_core::{JobError, JobObserver, JobPoller};
use cvforge_domain::{
    JobConfig, JobStatusReport, JobTicket, RewriteRequest, StageDefinition, UploadReceipt,
};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::client::ApiClient;
use super::errors::{ApiError, EnhancedError};
use crate::http::{ApiResponse, FileUpload, RequestOptions, UploadProgress};

/// Stages narrated to the UI while a rewrite runs
pub fn default_rewrite_stages() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new("analyzing", "Analyzing your CV"),
        StageDefinition::new("matching", "Matching the job description"),
        StageDefinition::new("rewriting", "Rewriting sections"),
        StageDefinition::new("finalizing", "Finalizing"),
    ]
}

#[derive(Clone, Debug)]
pub struct CvService {
    client: ApiClient,
    poller: JobPoller,
    jobs: JobConfig,
}

impl CvService {
    pub fn new(client: ApiClient, poller: JobPoller, jobs: JobConfig) -> Self {
        Self { client, poller, jobs }
    }

    /// Upload a CV document, reporting progress as 0-100 percentages.
    #[instrument(skip_all, fields(file = %upload.file_name, bytes = upload.len()))]
    pub async fn upload_cv(
        &self,
        upload: FileUpload,
        extra_fields: &[(String, String)],
        on_progress: Option<UploadProgress>,
    ) -> Result<UploadReceipt, EnhancedError> {
        let response = self
            .client
            .upload_file(
                &self.jobs.upload_path,
                &upload,
                extra_fields,
                on_progress.as_ref(),
                RequestOptions::default(),
            )
            .await?;
        info!("CV uploaded");
        decode(response, "POST", self.client.url(&self.jobs.upload_path))
    }

    /// Start a rewrite job and poll it to a terminal status.
    ///
    /// # Errors
    /// `JobError::NotStarted` when no session id is issued, `Failed` with the
    /// backend's message, `TimedOut` once the attempt budget is spent, and
    /// `Cancelled` when `cancel` fires.
    #[instrument(skip_all, fields(stages = stages.len()))]
    pub async fn rewrite_cv(
        &self,
        request: &RewriteRequest,
        stages: &[StageDefinition],
        observer: Option<&dyn JobObserver>,
        cancel: &CancellationToken,
    ) -> Result<JobStatusReport, JobError<EnhancedError>> {
        let client = &self.client;
        let jobs = &self.jobs;
        let initiate_url = client.url(&jobs.rewrite_path);
        let body = serde_json::to_value(request).map_err(|err| {
            JobError::Request(EnhancedError::new(
                ApiError::Decode(err.to_string()),
                "POST",
                initiate_url.clone(),
                0,
            ))
        })?;
        let rewrite_timeout = client.api().rewrite_timeout();

        let initiate = move || async move {
            let options = RequestOptions::default()
                .no_cache()
                .timeout(rewrite_timeout)
                .cancel_token(cancel.clone());
            let response =
                client.request(Method::POST, &jobs.rewrite_path, Some(&body), options).await?;
            decode::<JobTicket>(response, "POST", initiate_url.clone())
        };

        let poll = move |session_id: String| async move {
            let path = jobs.status_path(&session_id);
            // The poll interval is the only retry; a failed poll spends one attempt.
            let options = RequestOptions::default()
                .no_cache()
                .max_retries(0)
                .cancel_token(cancel.clone());
            let response = client.request(Method::GET, &path, None, options).await?;
            decode::<JobStatusReport>(response, "GET", client.url(&path))
        };

        self.poller.run_job(initiate, poll, stages, observer, cancel).await
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    response: ApiResponse,
    method: &str,
    url: String,
) -> Result<T, EnhancedError> {
    response.into_json().map_err(|err| EnhancedError::new(err, method, url, 1))
}
