//! Response cache for idempotent reads
//!
//! Entries are keyed by method + URL + request-body fingerprint and expire
//! after a per-entry TTL. Expired entries are treated as absent and purged
//! lazily on lookup.
//!
//! Only reads belong here; deciding what is cacheable is the caller's job.

pub mod response;
pub mod stats;

pub use response::{CacheKey, ResponseCache};
pub use stats::CacheStats;
