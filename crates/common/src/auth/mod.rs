//! Access-token helpers
//!
//! Decoding only: signatures are never verified client-side. The session
//! manager uses the `exp` claim to decide locally whether a token has
//! expired, without a network round trip.

pub mod claims;

pub use claims::{decode_claims, is_token_expired, ClaimsError, TokenClaims};
