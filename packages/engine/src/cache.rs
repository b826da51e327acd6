//! # Bounded Cache
//!
//! Generic key→value store bounded by entry age and entry count. Every
//! fetched or derived collection in the engine is memoized here.
//!
//! ## Design
//!
//! - Staleness is checked lazily on read; there is no background sweep
//! - At capacity, the entry with the oldest insertion time is evicted;
//!   re-fetched entries are re-inserted with a fresh timestamp, so
//!   frequently used keys naturally stay young
//! - Entries are replaced atomically, never mutated in place

use corkboard_common::{EntityKind, Node, NodeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Cache construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// Entries older than this are treated as absent.
    pub max_age: Duration,
    /// Maximum number of entries held at once (0 = unbounded).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            max_entries: 100,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
}

/// Time- and capacity-bounded cache.
#[derive(Debug)]
pub struct TimedCache<T> {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> TimedCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Get a value, treating stale entries as absent.
    ///
    /// A stale entry is evicted eagerly by the read that observes it.
    pub fn get(&mut self, key: &str) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.config.max_age => {
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace a value.
    ///
    /// Inserting a new key at capacity evicts the entry with the smallest
    /// insertion time.
    pub fn set(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        if self.config.max_entries > 0
            && !self.entries.contains_key(&key)
            && self.entries.len() >= self.config.max_entries
        {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a child collection: entity kind + scope id.
///
/// Namespacing by kind makes cross-kind collisions structurally impossible.
pub fn scope_key(kind: EntityKind, scope: &NodeId) -> String {
    format!("{}:{}", kind.as_str(), scope)
}

/// The cache instance shared by every loader.
pub type SharedCache = Arc<Mutex<TimedCache<Vec<Node>>>>;

pub fn shared_cache(config: CacheConfig) -> SharedCache {
    Arc::new(Mutex::new(TimedCache::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_age: Duration, max_entries: usize) -> CacheConfig {
        CacheConfig {
            max_age,
            max_entries,
        }
    }

    #[test]
    fn test_get_and_set() {
        let mut cache = TimedCache::new(CacheConfig::default());
        assert!(cache.is_empty());
        assert_eq!(cache.get("k1"), None);

        cache.set("k1", 1);
        assert_eq!(cache.get("k1"), Some(1));
        assert_eq!(cache.len(), 1);

        cache.set("k1", 2);
        assert_eq!(cache.get("k1"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_insertion() {
        let mut cache = TimedCache::new(config(Duration::from_secs(60), 2));
        cache.set("k1", 1);
        cache.set("k2", 2);
        cache.set("k3", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k2"), Some(2));
        assert_eq!(cache.get("k3"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsertion_refreshes_age() {
        let mut cache = TimedCache::new(config(Duration::from_secs(60), 2));
        cache.set("k1", 1);
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("k2", 2);
        tokio::time::advance(Duration::from_secs(1)).await;

        // k1 is re-inserted, so k2 is now the oldest.
        cache.set("k1", 10);
        cache.set("k3", 3);

        assert_eq!(cache.get("k1"), Some(10));
        assert_eq!(cache.get("k2"), None);
        assert_eq!(cache.get("k3"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_treated_as_absent() {
        let mut cache = TimedCache::new(config(Duration::from_secs(10), 10));
        cache.set("k1", 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k1"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k1"), None);
        // The stale read evicted the entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_max_entries_is_unbounded() {
        let mut cache = TimedCache::new(config(Duration::from_secs(60), 0));
        for i in 0..10 {
            cache.set(format!("k{}", i), i);
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get("k0"), Some(0));
        assert_eq!(cache.get("k9"), Some(9));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = TimedCache::new(CacheConfig::default());
        cache.set("k1", 1);
        cache.set("k2", 2);

        assert_eq!(cache.remove("k1"), Some(1));
        assert_eq!(cache.remove("k1"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scope_key_namespacing() {
        let id = NodeId::from("n1");
        assert_eq!(scope_key(EntityKind::Card, &id), "card:n1");
        assert_ne!(
            scope_key(EntityKind::Card, &id),
            scope_key(EntityKind::Stack, &id)
        );
    }
}
