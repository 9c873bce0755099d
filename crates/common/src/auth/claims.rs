//! JWT payload decoding

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while decoding a token payload
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token has no usable exp claim")]
    MissingExpiry,
}

/// Registered claims the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the UNIX epoch
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Expiry instant, if the claim is present and in range.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, ClaimsError> {
        let exp = self.exp.ok_or(ClaimsError::MissingExpiry)?;
        Utc.timestamp_opt(exp, 0).single().ok_or(ClaimsError::MissingExpiry)
    }

    /// `true` once `now + leeway` reaches the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        match self.expires_at() {
            Ok(expires_at) => now + leeway >= expires_at,
            Err(_) => true,
        }
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Local expiry check; undecodable tokens count as expired.
pub fn is_token_expired(token: &str, now: DateTime<Utc>, leeway: Duration) -> bool {
    decode_claims(token).map(|claims| claims.is_expired_at(now, leeway)).unwrap_or(true)
}
