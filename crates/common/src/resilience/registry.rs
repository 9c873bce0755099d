//! Combined circuit and cache state store.
//!
//! Constructed once per process and shared by every request executor. Pure
//! state: no I/O happens here.

use std::time::Duration;

use serde_json::Value;

use super::circuit_breaker::{CircuitConfig, CircuitRegistry, CircuitStatus};
use crate::cache::{CacheKey, ResponseCache};
use crate::time::{Clock, SystemClock};

/// Circuit breaker records plus the idempotent-read response cache
pub struct ResilienceRegistry<C: Clock + Clone = SystemClock> {
    circuits: CircuitRegistry<C>,
    cache: ResponseCache<Value, C>,
}

impl<C: Clock + Clone> Clone for ResilienceRegistry<C> {
    fn clone(&self) -> Self {
        Self { circuits: self.circuits.clone(), cache: self.cache.clone() }
    }
}

impl<C: Clock + Clone> std::fmt::Debug for ResilienceRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceRegistry")
            .field("circuits", &self.circuits)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

impl ResilienceRegistry<SystemClock> {
    pub fn new(circuit: CircuitConfig, cache_ttl: Duration, cache_capacity: usize) -> Self {
        Self::with_clock(circuit, cache_ttl, cache_capacity, SystemClock)
    }
}

impl<C: Clock + Clone> ResilienceRegistry<C> {
    pub fn with_clock(
        circuit: CircuitConfig,
        cache_ttl: Duration,
        cache_capacity: usize,
        clock: C,
    ) -> Self {
        Self {
            circuits: CircuitRegistry::with_clock(circuit, clock.clone()),
            cache: ResponseCache::with_clock(cache_ttl, cache_capacity, clock),
        }
    }

    pub fn is_open(&self, endpoint: &str) -> bool {
        self.circuits.is_open(endpoint)
    }

    pub fn record_failure(&self, endpoint: &str) -> CircuitStatus {
        self.circuits.record_failure(endpoint)
    }

    pub fn record_success(&self, endpoint: &str) {
        self.circuits.record_success(endpoint);
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.cache.get(key)
    }

    /// Store a payload; `ttl = None` uses the registry default.
    pub fn put(&self, key: CacheKey, payload: Value, ttl: Option<Duration>) {
        self.cache.put(key, payload, ttl);
    }

    pub fn circuits(&self) -> &CircuitRegistry<C> {
        &self.circuits
    }

    pub fn cache(&self) -> &ResponseCache<Value, C> {
        &self.cache
    }
}
