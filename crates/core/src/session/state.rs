//! Local session state evaluation

use chrono::{DateTime, Duration, Utc};
use cvforge_common::is_token_expired;
use cvforge_domain::{CredentialPair, SessionState};

/// Derive the session state from stored credentials without any network
/// call.
///
/// `Refreshing` is never returned here; only the session manager knows
/// whether a refresh is in flight.
pub fn evaluate_state(
    credentials: Option<&CredentialPair>,
    now: DateTime<Utc>,
    leeway: Duration,
) -> SessionState {
    match credentials {
        None => SessionState::Unauthenticated,
        Some(pair) if pair.access_token.is_empty() => SessionState::Unauthenticated,
        Some(pair) if is_token_expired(&pair.access_token, now, leeway) => SessionState::Expired,
        Some(_) => SessionState::Valid,
    }
}

#[cfg(test)]
mod tests {
    use cvforge_common::testing::unsigned_jwt;

    use super::*;

    fn pair(access: String) -> CredentialPair {
        CredentialPair::new(access, "refresh-token")
    }

    #[test]
    fn no_credentials_is_unauthenticated() {
        assert_eq!(evaluate_state(None, Utc::now(), Duration::zero()), SessionState::Unauthenticated);
        let empty = pair(String::new());
        assert_eq!(
            evaluate_state(Some(&empty), Utc::now(), Duration::zero()),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn expiry_claim_decides_valid_or_expired() {
        let now = Utc::now();
        let fresh = pair(unsigned_jwt(now.timestamp() + 600));
        let stale = pair(unsigned_jwt(now.timestamp() - 1));

        assert_eq!(evaluate_state(Some(&fresh), now, Duration::zero()), SessionState::Valid);
        assert_eq!(evaluate_state(Some(&stale), now, Duration::zero()), SessionState::Expired);
        assert_eq!(
            evaluate_state(Some(&fresh), now, Duration::seconds(900)),
            SessionState::Expired
        );
    }

    #[test]
    fn opaque_access_token_is_expired() {
        let opaque = pair("not-a-jwt".into());
        assert_eq!(evaluate_state(Some(&opaque), Utc::now(), Duration::zero()), SessionState::Expired);
    }
}
