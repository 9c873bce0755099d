//! Test token minting

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Build an unsigned JWT whose payload carries `exp` and `user_id`.
///
/// The signature segment is a fixed placeholder; clients never verify it.
pub fn unsigned_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"user_id":1}}"#).as_bytes());
    format!("{header}.{payload}.test-signature")
}

/// Token that expires an hour from now.
pub fn valid_jwt() -> String {
    unsigned_jwt(chrono::Utc::now().timestamp() + 3_600)
}

/// Token that expired a minute ago.
pub fn expired_jwt() -> String {
    unsigned_jwt(chrono::Utc::now().timestamp() - 60)
}
