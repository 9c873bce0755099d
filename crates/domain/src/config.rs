//! Configuration structures
//!
//! Every section deserializes with defaults so partial TOML/JSON files are
//! accepted. Use [`Config::validate`] after loading.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_MS, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_COOLDOWN_SECS,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_JOB_MAX_ATTEMPTS, DEFAULT_JOB_POLL_INTERVAL_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_REWRITE_TIMEOUT_SECS,
    DEFAULT_TOKEN_STORE_FILE, DEFAULT_UPLOAD_TIMEOUT_SECS, PASSWORD_RESET_PATH, REGISTER_PATH,
    REWRITE_PATH, REWRITE_STATUS_PATH, TOKEN_OBTAIN_PATH, TOKEN_REFRESH_PATH, UPLOAD_PATH,
};
use crate::errors::{CvForgeError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub resilience: ResilienceConfig,
    pub session: SessionConfig,
    pub jobs: JobConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate cross-field invariants.
    ///
    /// # Errors
    /// Returns `CvForgeError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CvForgeError::Config("api.base_url must not be empty".into()));
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(CvForgeError::Config(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.resilience.backoff_ms.is_empty() {
            return Err(CvForgeError::Config("resilience.backoff_ms must not be empty".into()));
        }
        if self.resilience.failure_threshold == 0 {
            return Err(CvForgeError::Config(
                "resilience.failure_threshold must be greater than 0".into(),
            ));
        }
        if self.jobs.max_attempts == 0 {
            return Err(CvForgeError::Config("jobs.max_attempts must be greater than 0".into()));
        }
        if !self.jobs.rewrite_status_path.contains(crate::constants::SESSION_ID_PLACEHOLDER) {
            return Err(CvForgeError::Config(
                "jobs.rewrite_status_path must contain the {session_id} placeholder".into(),
            ));
        }
        Ok(())
    }
}

/// Remote backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL without trailing slash (e.g. "https://api.cvforge.app")
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub rewrite_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            rewrite_timeout_secs: DEFAULT_REWRITE_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl ApiConfig {
    /// Join the base URL with an absolute API path.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_secs(self.rewrite_timeout_secs)
    }
}

/// Retry, circuit breaker and cache policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_retries: u32,
    /// Delays between attempts; the last value repeats for further retries
    pub backoff_ms: Vec<u64>,
    /// Consecutive failures that open an endpoint's circuit
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS.to_vec(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl ResilienceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_ms.iter().copied().map(Duration::from_millis).collect()
    }
}

/// Credential persistence and auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// File backing the durable token store
    pub token_store_path: PathBuf,
    pub refresh_path: String,
    pub login_path: String,
    pub register_path: String,
    pub password_reset_path: String,
    /// Treat tokens as expired this many seconds before their `exp` claim
    pub expiry_leeway_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_store_path: PathBuf::from(DEFAULT_TOKEN_STORE_FILE),
            refresh_path: TOKEN_REFRESH_PATH.to_string(),
            login_path: TOKEN_OBTAIN_PATH.to_string(),
            register_path: REGISTER_PATH.to_string(),
            password_reset_path: PASSWORD_RESET_PATH.to_string(),
            expiry_leeway_secs: 0,
        }
    }
}

/// Long-running job polling policy and endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    pub rewrite_path: String,
    /// Must contain `{session_id}`
    pub rewrite_status_path: String,
    pub upload_path: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_JOB_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_JOB_POLL_INTERVAL_MS,
            rewrite_path: REWRITE_PATH.to_string(),
            rewrite_status_path: REWRITE_STATUS_PATH.to_string(),
            upload_path: UPLOAD_PATH.to_string(),
        }
    }
}

impl JobConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Status path with the session id substituted.
    pub fn status_path(&self, session_id: &str) -> String {
        self.rewrite_status_path.replace(crate::constants::SESSION_ID_PLACEHOLDER, session_id)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-module overrides, e.g. `{"http" = "debug"}`
    pub component_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty, component_levels: HashMap::new() }
    }
}
