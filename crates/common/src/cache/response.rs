//! TTL response cache backed by `DashMap`

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::stats::CacheStats;
use crate::time::{Clock, SystemClock};

/// Cache key: method, URL and a blake3 fingerprint of the request body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: String,
    body_fingerprint: Option<String>,
}

impl CacheKey {
    pub fn new(method: &str, url: &str, body: Option<&[u8]>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            body_fingerprint: body.map(|bytes| blake3::hash(bytes).to_hex().to_string()),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body_fingerprint {
            Some(fp) => write!(f, "{} {} #{}", self.method, self.url, &fp[..fp.len().min(12)]),
            None => write!(f, "{} {}", self.method, self.url),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// In-memory response cache with per-entry TTL
///
/// Generic over `Clock` for deterministic testing with `MockClock`. Clones
/// share the same entries.
pub struct ResponseCache<V, C: Clock = SystemClock> {
    entries: Arc<DashMap<CacheKey, CacheEntry<V>>>,
    default_ttl: Duration,
    max_entries: usize,
    counters: Arc<Counters>,
    clock: Arc<C>,
}

impl<V, C: Clock> Clone for ResponseCache<V, C> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
            max_entries: self.max_entries,
            counters: Arc::clone(&self.counters),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V: Clone> ResponseCache<V, SystemClock> {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(default_ttl, max_entries, SystemClock)
    }
}

impl<V: Clone, C: Clock> ResponseCache<V, C> {
    pub fn with_clock(default_ttl: Duration, max_entries: usize, clock: C) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
            max_entries: max_entries.max(1),
            counters: Arc::new(Counters::default()),
            clock: Arc::new(clock),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry, purging it if expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let lookup =
            self.entries.get(key).map(|entry| (entry.expires_at > now).then(|| entry.payload.clone()));

        match lookup {
            Some(Some(payload)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Response cache hit");
                Some(payload)
            }
            Some(None) => {
                if self.entries.remove_if(key, |_, entry| entry.expires_at <= now).is_some() {
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                }
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Response cache entry expired");
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace an entry. `ttl = None` uses the default TTL.
    pub fn put(&self, key: CacheKey, payload: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(now);
        }

        self.entries.insert(key, CacheEntry { payload, expires_at: now + ttl });
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose URL starts with `url_prefix`.
    pub fn invalidate_prefix(&self, url_prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.url.starts_with(url_prefix));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    // Drop expired entries first; if still full, evict the entry closest to
    // expiry.
    fn make_room(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len()) as u64;
        self.counters.expirations.fetch_add(purged, Ordering::Relaxed);

        if self.entries.len() < self.max_entries {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(victim) = victim {
            self.entries.remove(&victim);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %victim, "Response cache evicted entry");
        }
    }
}
