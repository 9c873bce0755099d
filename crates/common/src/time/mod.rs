//! Time abstraction for deterministic testing
//!
//! The circuit registry and response cache read time through [`Clock`] so
//! cooldown and TTL behaviour can be exercised with [`MockClock`] instead of
//! real sleeps.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
