//! Cache statistics

/// Counters for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries (may include not-yet-purged expired ones)
    pub size: usize,

    /// Maximum allowed entries
    pub max_size: usize,

    /// Lookups served from the cache
    pub hits: u64,

    /// Lookups that found nothing or an expired entry
    pub misses: u64,

    /// Entries removed to make room
    pub evictions: u64,

    /// Expired entries removed on lookup
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
