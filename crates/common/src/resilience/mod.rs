//! Resilience primitives for the request executor
//!
//! - **Circuit registry**: per-endpoint failure tracking with fail-fast
//!   cooldown
//! - **Backoff schedule**: explicit retry delays
//! - **Registry facade**: circuits plus response cache, shared process-wide
//!
//! These are synchronous state stores; the async retry loop that drives them
//! lives in the infrastructure crate's request executor.

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;

pub use backoff::BackoffSchedule;
pub use circuit_breaker::{CircuitConfig, CircuitRecord, CircuitRegistry, CircuitStatus};
pub use registry::ResilienceRegistry;
