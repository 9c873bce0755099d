//! Per-request options and the executor's response type

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::errors::ApiError;

/// Options for one logical call
///
/// Unset fields fall back to the executor's policy.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    /// Extra headers sent with every attempt
    pub headers: Vec<(String, String)>,
    /// Consult and populate the response cache (reads only)
    pub cache: bool,
    /// Cache TTL override
    pub cache_ttl: Option<Duration>,
    /// Retry budget override
    pub max_retries: Option<u32>,
    /// Checked before each attempt and raced against backoff sleeps
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            headers: Vec::new(),
            cache: true,
            cache_ttl: None,
            max_retries: None,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace any existing `Authorization` header with a bearer token.
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        self.headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Successful response of a logical call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` for empty bodies
    pub body: Value,
    /// Served from the response cache without a network attempt
    pub from_cache: bool,
}

impl ApiResponse {
    pub(crate) fn cached(body: Value) -> Self {
        Self { status: 200, body, from_cache: true }
    }

    /// Deserialize the body into a typed payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone()).map_err(|err| ApiError::Decode(err.to_string()))
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}
