//! API-specific error types
//!
//! [`ApiError`] classifies a failed call for the retry policy. Every error
//! that leaves the request executor is wrapped in an [`EnhancedError`], which
//! adds the failing URL, a timestamp, the attempt count and a message fit for
//! display.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cvforge_core::PollFailure;
use thiserror::Error;

/// Categories of API errors for retry logic and user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401/403 and failed refreshes - never retried
    Authentication,
    /// 422 - never retried
    Validation,
    /// 429 - retried with backoff
    RateLimit,
    /// 5xx - retried with backoff
    Server,
    /// Other 4xx - not retried (408 excepted)
    Client,
    /// Connection failures - retried
    Network,
    /// Per-attempt timeout elapsed - retried
    Timeout,
    /// Rejected locally without a network attempt
    CircuitOpen,
    /// Stopped by the caller
    Cancelled,
    /// Unparseable response or bad local setup - not retried
    Internal,
}

/// API operation errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Circuit breaker open, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth { status, message },
            422 => Self::Validation(message),
            429 => Self::RateLimit(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth { .. } | Self::SessionExpired(_) => ApiErrorCategory::Authentication,
            Self::Validation(_) => ApiErrorCategory::Validation,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Client { .. } => ApiErrorCategory::Client,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Timeout(_) => ApiErrorCategory::Timeout,
            Self::CircuitOpen { .. } => ApiErrorCategory::CircuitOpen,
            Self::Cancelled => ApiErrorCategory::Cancelled,
            Self::Decode(_) | Self::Config(_) => ApiErrorCategory::Internal,
        }
    }

    /// Check if this error should be retried
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Client { status, .. } => *status == 408,
            _ => matches!(
                self.category(),
                ApiErrorCategory::RateLimit
                    | ApiErrorCategory::Server
                    | ApiErrorCategory::Network
                    | ApiErrorCategory::Timeout
            ),
        }
    }

    /// HTTP status carried by the error, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Server { status, .. } | Self::Client { status, .. } => {
                Some(*status)
            }
            Self::Validation(_) => Some(422),
            Self::RateLimit(_) => Some(429),
            _ => None,
        }
    }

    /// Message suitable for direct display, keyed by category.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(_) => {
                "The request timed out. Please check your connection and try again.".to_string()
            }
            Self::Server { status: 502..=504, .. } => {
                "The server is busy right now. Please try again in a moment.".to_string()
            }
            Self::Server { .. } => {
                "The server ran into a problem. Please try again later.".to_string()
            }
            Self::Network(_) => {
                "Unable to reach the server. Please check your internet connection.".to_string()
            }
            Self::CircuitOpen { retry_after } => format!(
                "The service is temporarily unavailable. Please try again in {} seconds.",
                retry_after.as_secs().max(1)
            ),
            Self::Auth { status: 403, .. } => {
                "You do not have permission to perform this action.".to_string()
            }
            Self::Auth { .. } | Self::SessionExpired(_) => {
                "Your session has expired. Please log in again.".to_string()
            }
            Self::Validation(detail) if !detail.trim().is_empty() => {
                format!("Some of the submitted information is invalid: {detail}")
            }
            Self::Validation(_) => "Some of the submitted information is invalid.".to_string(),
            Self::RateLimit(_) => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            Self::Client { status: 404, .. } => {
                "The requested resource could not be found.".to_string()
            }
            Self::Client { .. } => "The request could not be completed.".to_string(),
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::Decode(_) => "The server returned an unexpected response.".to_string(),
            Self::Config(_) => "The application is not configured correctly.".to_string(),
        }
    }
}

/// A failed logical call, enriched for diagnostics and display
///
/// The underlying [`ApiError`] is preserved as the error source.
#[derive(Debug, Clone, Error)]
#[error("{method} {url} failed after {attempts} attempt(s): {source}")]
pub struct EnhancedError {
    pub source: ApiError,
    pub user_message: String,
    pub method: String,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
    /// Network attempts made; 0 when rejected before any attempt
    pub attempts: u32,
}

impl EnhancedError {
    pub fn new(
        source: ApiError,
        method: impl Into<String>,
        url: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            user_message: source.user_message(),
            source,
            method: method.into(),
            url: url.into(),
            occurred_at: Utc::now(),
            attempts,
        }
    }

    pub fn kind(&self) -> &ApiError {
        &self.source
    }

    pub fn into_inner(self) -> ApiError {
        self.source
    }

    pub fn category(&self) -> ApiErrorCategory {
        self.source.category()
    }

    pub fn status(&self) -> Option<u16> {
        self.source.status()
    }

    /// `true` for a 401 response, the trigger for refresh-and-replay.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.source, ApiError::Auth { status: 401, .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self.source, ApiError::CircuitOpen { .. })
    }
}

impl PollFailure for EnhancedError {
    // A lost session cannot recover within the poll loop.
    fn aborts_job(&self) -> bool {
        matches!(self.source, ApiError::SessionExpired(_) | ApiError::Auth { .. })
    }
}
