//! Per-endpoint circuit breaker registry
//!
//! Each endpoint identity owns one [`CircuitRecord`]. After
//! `failure_threshold` consecutive failures the circuit opens for a fixed
//! cooldown; while open and inside the cooldown, callers fail fast without
//! touching the network.
//!
//! # State Transitions
//! ```text
//! Closed → Open:   consecutive_failures >= failure_threshold
//! Open   → (probe allowed): cooldown elapsed, status still Open
//! Open   → Open:   failure after cooldown (new cooldown window)
//! *      → Closed: any success (count reset to 0)
//! ```
//!
//! There is no half-open probe budget: once the cooldown has elapsed every
//! caller may try, and the first success closes the circuit.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::time::{Clock, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CircuitStatus {
    /// Calls flow normally
    #[default]
    Closed,
    /// Calls are rejected until `reopen_at`
    Open,
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitStatus::Closed => write!(f, "CLOSED"),
            CircuitStatus::Open => write!(f, "OPEN"),
        }
    }
}

/// Circuit state for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitRecord {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    /// Earliest instant a new attempt may be made while open
    pub reopen_at: Option<Instant>,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long an opened circuit rejects calls
    pub cooldown: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(30) }
    }
}

/// Registry of circuit records keyed by endpoint
///
/// Cloning is cheap; clones share the same records.
pub struct CircuitRegistry<C: Clock = SystemClock> {
    config: CircuitConfig,
    records: Arc<DashMap<String, CircuitRecord>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for CircuitRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            records: Arc::clone(&self.records),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitRegistry")
            .field("config", &self.config)
            .field("endpoints", &self.records.len())
            .finish()
    }
}

impl CircuitRegistry<SystemClock> {
    /// Create a registry using the system clock
    pub fn new(config: CircuitConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitRegistry<C> {
    /// Create a registry with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitConfig, clock: C) -> Self {
        let config = CircuitConfig { failure_threshold: config.failure_threshold.max(1), ..config };
        Self { config, records: Arc::new(DashMap::new()), clock: Arc::new(clock) }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// `true` while the endpoint's circuit is open and its cooldown has not
    /// elapsed.
    pub fn is_open(&self, endpoint: &str) -> bool {
        self.remaining_cooldown(endpoint).is_some()
    }

    /// Time left before an open circuit accepts attempts again.
    pub fn remaining_cooldown(&self, endpoint: &str) -> Option<Duration> {
        let now = self.clock.now();
        let record = self.records.get(endpoint)?;
        match (record.status, record.reopen_at) {
            (CircuitStatus::Open, Some(reopen_at)) if now < reopen_at => {
                Some(reopen_at.duration_since(now))
            }
            _ => None,
        }
    }

    /// Record a failed logical call, opening the circuit at the threshold.
    pub fn record_failure(&self, endpoint: &str) -> CircuitStatus {
        let now = self.clock.now();
        let mut record = self.records.entry(endpoint.to_string()).or_default();

        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure_at = Some(now);

        if record.consecutive_failures >= self.config.failure_threshold {
            let was_open = record.status == CircuitStatus::Open;
            record.status = CircuitStatus::Open;
            record.reopen_at = Some(now + self.config.cooldown);
            if was_open {
                warn!(
                    endpoint,
                    failures = record.consecutive_failures,
                    "Circuit breaker re-opened after failed attempt past cooldown"
                );
            } else {
                warn!(
                    endpoint,
                    failures = record.consecutive_failures,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "Circuit breaker opened"
                );
            }
        } else {
            debug!(endpoint, failures = record.consecutive_failures, "Circuit failure recorded");
        }

        record.status
    }

    /// Record a successful call: resets the failure count and closes the
    /// circuit immediately.
    pub fn record_success(&self, endpoint: &str) {
        if let Some(mut record) = self.records.get_mut(endpoint) {
            if record.status == CircuitStatus::Open {
                info!(endpoint, "Circuit breaker closed after successful call");
            }
            *record = CircuitRecord::default();
        }
    }

    /// Snapshot of the endpoint's record (closed default if unknown).
    pub fn circuit(&self, endpoint: &str) -> CircuitRecord {
        self.records.get(endpoint).map(|r| r.clone()).unwrap_or_default()
    }

    /// Forget one endpoint's state.
    pub fn reset(&self, endpoint: &str) {
        self.records.remove(endpoint);
    }

    /// Forget all endpoints.
    pub fn clear(&self) {
        self.records.clear();
    }
}
