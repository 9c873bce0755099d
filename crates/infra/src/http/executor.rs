//! Resilient request executor
//!
//! Wraps one logical HTTP call with the shared resilience policy:
//! 1. fail fast while the endpoint's circuit is open
//! 2. serve cacheable reads from the response cache
//! 3. attempt the call, retrying transient failures on the backoff schedule
//! 4. record exactly one success or failure per logical call
//!
//! Attempts within one call are strictly sequential. Cancellation is checked
//! before every attempt and raced against both the in-flight attempt and the
//! backoff sleep. A cancelled call records no circuit failure.

use std::future::Future;
use std::time::Duration;

use cvforge_common::{BackoffSchedule, CacheKey, ResilienceRegistry};
use cvforge_domain::{Config, CvForgeError};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, HttpClientBuilder};
use super::options::{ApiResponse, RequestOptions};
use super::upload::{FileUpload, UploadProgress};
use crate::api::errors::{ApiError, EnhancedError};

/// Defaults applied when a call's options leave a field unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorPolicy {
    pub max_retries: u32,
    pub backoff: BackoffSchedule,
    pub upload_timeout: Duration,
}

impl Default for ExecutorPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffSchedule::default(),
            upload_timeout: Duration::from_secs(120),
        }
    }
}

impl ExecutorPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.resilience.max_retries,
            backoff: BackoffSchedule::new(config.resilience.backoff_schedule()),
            upload_timeout: config.api.upload_timeout(),
        }
    }
}

/// Executes logical calls against the shared circuit and cache state
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    http: HttpClient,
    registry: ResilienceRegistry,
    policy: ExecutorPolicy,
}

impl RequestExecutor {
    pub fn new(http: HttpClient, registry: ResilienceRegistry, policy: ExecutorPolicy) -> Self {
        Self { http, registry, policy }
    }

    /// Build an executor from configuration.
    ///
    /// `cookie_store` is enabled for the auth-exempt client only.
    pub fn from_config(
        config: &Config,
        registry: ResilienceRegistry,
        cookie_store: bool,
    ) -> Result<Self, CvForgeError> {
        let http = HttpClientBuilder::from_config(&config.api).cookie_store(cookie_store).build()?;
        Ok(Self::new(http, registry, ExecutorPolicy::from_config(config)))
    }

    pub fn registry(&self) -> &ResilienceRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &ExecutorPolicy {
        &self.policy
    }

    /// Execute one logical call with an optional JSON body.
    ///
    /// Only `GET` calls are cached, and only while `options.cache` is set.
    ///
    /// # Errors
    /// Every failure is returned as an [`EnhancedError`]; see the module docs
    /// for the retry and circuit rules.
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<ApiResponse, EnhancedError> {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| self.enhance(ApiError::Decode(err.to_string()), &method, url, 0))?;

        let cache_key = (method == Method::GET && options.cache)
            .then(|| CacheKey::new(method.as_str(), url, payload.as_deref()));

        let http = &self.http;
        let request_method = &method;
        let payload = payload.as_ref();
        self.run(method.clone(), url, cache_key, options, options.timeout, move |_| async move {
            let mut builder = http.request(request_method.clone(), url);
            if let Some(bytes) = payload {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            Ok::<_, ApiError>(builder)
        })
        .await
    }

    /// Upload a file as multipart field `file` plus `extra_fields`.
    ///
    /// Follows the same circuit and retry rules as [`execute`](Self::execute)
    /// but is never cached. The body is rebuilt for every attempt; `progress`
    /// is shared across attempts so reported percentages never decrease, and
    /// 100 is reported only after a successful response.
    #[instrument(skip_all, fields(url = %url, file = %upload.file_name, bytes = upload.len()))]
    pub async fn upload_file(
        &self,
        url: &str,
        upload: &FileUpload,
        extra_fields: &[(String, String)],
        progress: Option<&UploadProgress>,
        options: &RequestOptions,
    ) -> Result<ApiResponse, EnhancedError> {
        let http = &self.http;
        let timeout = options.timeout.or(Some(self.policy.upload_timeout));
        let response = self
            .run(Method::POST, url, None, options, timeout, move |_| async move {
                let form = upload.form(extra_fields, progress)?;
                Ok::<_, ApiError>(http.request(Method::POST, url).multipart(form))
            })
            .await?;

        if let Some(progress) = progress {
            progress.complete();
        }
        Ok(response)
    }

    async fn run<F, Fut>(
        &self,
        method: Method,
        url: &str,
        cache_key: Option<CacheKey>,
        options: &RequestOptions,
        timeout: Option<Duration>,
        mut build: F,
    ) -> Result<ApiResponse, EnhancedError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<RequestBuilder, ApiError>>,
    {
        if let Some(retry_after) = self.registry.circuits().remaining_cooldown(url) {
            warn!(%method, url, ?retry_after, "Circuit open, failing fast");
            return Err(self.enhance(ApiError::CircuitOpen { retry_after }, &method, url, 0));
        }

        if let Some(key) = &cache_key {
            if let Some(body) = self.registry.get(key) {
                debug!(%method, url, "Serving response from cache");
                return Ok(ApiResponse::cached(body));
            }
        }

        let max_retries = options.max_retries.unwrap_or(self.policy.max_retries);
        let mut attempt = 0_u32;

        loop {
            if options.is_cancelled() {
                return Err(self.enhance(ApiError::Cancelled, &method, url, attempt));
            }
            attempt += 1;

            let outcome = match build(attempt).await {
                Ok(builder) => {
                    let builder = options
                        .headers
                        .iter()
                        .fold(builder, |builder, (name, value)| builder.header(name, value));
                    self.cancellable(options, self.attempt(builder, timeout)).await
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(response) => {
                    self.registry.record_success(url);
                    if let Some(key) = cache_key {
                        self.registry.put(key, response.body.clone(), options.cache_ttl);
                    }
                    if attempt > 1 {
                        info!(%method, url, attempt, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(ApiError::Cancelled) => {
                    info!(%method, url, attempt, "Request cancelled");
                    return Err(self.enhance(ApiError::Cancelled, &method, url, attempt));
                }
                Err(err) if err.should_retry() && attempt <= max_retries => {
                    let delay = self.policy.backoff.delay_for_retry(attempt);
                    warn!(%method, url, attempt, error = %err, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "Transient failure, retrying");
                    if self.cancellable(options, sleep_ok(delay)).await.is_err() {
                        return Err(self.enhance(ApiError::Cancelled, &method, url, attempt));
                    }
                }
                Err(err) => {
                    self.registry.record_failure(url);
                    warn!(%method, url, attempt, error = %err, "Request failed");
                    return Err(self.enhance(err, &method, url, attempt));
                }
            }
        }
    }

    async fn attempt(
        &self,
        builder: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.http.send(builder, timeout).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), error_detail(&body)));
        }

        let bytes = response.bytes().await.map_err(|err| ApiError::Network(err.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))?
        };

        Ok(ApiResponse { status: status.as_u16(), body, from_cache: false })
    }

    async fn cancellable<T>(
        &self,
        options: &RequestOptions,
        work: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        match &options.cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(ApiError::Cancelled),
                result = work => result,
            },
            None => work.await,
        }
    }

    fn enhance(&self, err: ApiError, method: &Method, url: &str, attempts: u32) -> EnhancedError {
        EnhancedError::new(err, method.as_str(), url, attempts)
    }
}

async fn sleep_ok(delay: Duration) -> Result<(), ApiError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

// Prefer the backend's `detail`/`message` field over the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|field| value.get(field).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(512).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_structured_fields() {
        assert_eq!(error_detail(r#"{"detail":"Token is invalid"}"#), "Token is invalid");
        assert_eq!(error_detail(r#"{"message":"bad"}"#), "bad");
        assert_eq!(error_detail("upstream exploded"), "upstream exploded");
        assert_eq!(error_detail(""), "");
    }

    #[test]
    fn policy_follows_config() {
        let mut config = Config::default();
        config.resilience.max_retries = 1;
        config.resilience.backoff_ms = vec![5];
        let policy = ExecutorPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.backoff.delay_for_retry(3), Duration::from_millis(5));
        assert_eq!(policy.upload_timeout, Duration::from_secs(120));
    }
}
