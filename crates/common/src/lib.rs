//! Modular common utilities shared across CvForge crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: access-token claim decoding
//! - `runtime`: clock, backoff schedule and the shared state stores (circuit
//!   registry, response cache)
//! - `test-utils`: helpers for minting test tokens

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use auth::{decode_claims, is_token_expired, ClaimsError, TokenClaims};
#[cfg(feature = "runtime")]
pub use cache::{CacheKey, CacheStats, ResponseCache};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffSchedule, CircuitConfig, CircuitRecord, CircuitRegistry, CircuitStatus,
    ResilienceRegistry,
};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
