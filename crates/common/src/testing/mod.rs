//! Testing utilities and helpers
//!
//! - [`tokens`]: unsigned JWTs with a chosen expiry, for exercising session
//!   logic without a real identity provider
//! - [`MockClock`]: re-exported so tests need a single import path

pub mod tokens;

pub use tokens::{expired_jwt, unsigned_jwt, valid_jwt};

pub use crate::time::{Clock, MockClock, SystemClock};
