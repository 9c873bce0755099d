//! Credential and session types
//!
//! Wire shapes follow the backend's token endpoints:
//! - refresh: `{ "refresh": ... }` → `{ "access": ... }`
//! - obtain:  `{ "username": ..., "password": ... }` → `{ "access": ..., "refresh": ... }`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh token pair owned by the session manager
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived signed token carrying an `exp` claim
    pub access_token: String,
    /// Longer-lived opaque token used only against the refresh endpoint
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

// Tokens must never reach log output.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/token/refresh/`
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Successful refresh response
///
/// Backends that rotate refresh tokens also return a new `refresh`.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse").field("rotated", &self.refresh.is_some()).finish()
    }
}

/// Body of the login (token obtain) request
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Successful login response
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
}

impl From<LoginResponse> for CredentialPair {
    fn from(value: LoginResponse) -> Self {
        CredentialPair::new(value.access, value.refresh)
    }
}

/// Observable session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Access token present and its expiry claim is in the future
    Valid,
    /// Access token present but its expiry claim has passed
    Expired,
    /// A refresh call is in flight
    Refreshing,
    /// No tokens, or the last refresh attempt failed
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, SessionState::Unauthenticated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Valid => "valid",
            SessionState::Expired => "expired",
            SessionState::Refreshing => "refreshing",
            SessionState::Unauthenticated => "unauthenticated",
        };
        f.write_str(label)
    }
}
