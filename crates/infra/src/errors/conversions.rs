//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use cvforge_domain::CvForgeError;
use reqwest::Error as HttpError;

use crate::api::errors::ApiError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CvForgeError);

impl From<InfraError> for CvForgeError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CvForgeError> for InfraError {
    fn from(value: CvForgeError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

/// Classify a transport-level failure.
///
/// `timeout` is the per-attempt budget that was in force, reported back on
/// timeouts.
pub fn classify_transport_error(err: &HttpError, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(timeout);
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return ApiError::Network(format!("connection failure: {err}"));
    }

    if err.is_builder() {
        return ApiError::Config(format!("invalid request: {err}"));
    }

    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }

    if let Some(status) = err.status() {
        return ApiError::from_status(status.as_u16(), err.to_string());
    }

    ApiError::Network(err.to_string())
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let message = value.to_string();
        let mapped = if value.is_builder() {
            CvForgeError::Config(message)
        } else if let Some(status) = value.status() {
            match status.as_u16() {
                401 | 403 => CvForgeError::Auth(message),
                404 => CvForgeError::NotFound(message),
                400..=499 => CvForgeError::InvalidInput(message),
                _ => CvForgeError::Network(message),
            }
        } else {
            CvForgeError::Network(message)
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → CvForgeError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        let mapped = match value.kind() {
            std::io::ErrorKind::NotFound => CvForgeError::NotFound(value.to_string()),
            _ => CvForgeError::Storage(value.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CvForgeError::Storage(format!("invalid JSON: {value}")))
    }
}

impl From<ApiError> for InfraError {
    fn from(value: ApiError) -> Self {
        let message = value.to_string();
        let mapped = match value {
            ApiError::Auth { .. } | ApiError::SessionExpired(_) => CvForgeError::Auth(message),
            ApiError::Validation(_) => CvForgeError::InvalidInput(message),
            ApiError::Client { status: 404, .. } => CvForgeError::NotFound(message),
            ApiError::Client { .. } => CvForgeError::InvalidInput(message),
            ApiError::Config(_) => CvForgeError::Config(message),
            ApiError::Decode(_) | ApiError::Cancelled => CvForgeError::Internal(message),
            ApiError::RateLimit(_)
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout(_)
            | ApiError::CircuitOpen { .. } => CvForgeError::Network(message),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
