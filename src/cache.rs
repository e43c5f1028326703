//! Bounded TTL read cache (spec §5 Caching). A pure optimization — never
//! authoritative, never consulted for a write path — used for read-mostly
//! aggregations like focus-area analytics. Backed by `DashMap`, matching
//! the concurrency primitive the rest of the engine already uses.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct ReadCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> ReadCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns the cached value if present and not yet expired. An expired
    /// entry is evicted on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            None
        } else {
            self.entries.get(key).map(|e| e.value.clone())
        }
    }

    /// Inserts `value`, evicting the oldest entry first if the cache is at
    /// capacity (clock-based eviction per §5 — oldest insertion wins, not
    /// an LRU access-order policy).
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|e| e.inserted_at)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&oldest_key);
            }
        }

        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn returns_none_for_missing_key() {
        let cache: ReadCache<String, u32> = ReadCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get(&"x".to_string()), None);
    }

    #[test]
    fn returns_inserted_value() {
        let cache = ReadCache::new(4, Duration::from_secs(60));
        cache.insert("x".to_string(), 42u32);
        assert_eq!(cache.get(&"x".to_string()), Some(42));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = ReadCache::new(4, Duration::from_millis(10));
        cache.insert("x".to_string(), 42u32);
        sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"x".to_string()), None);
    }

    #[test]
    fn evicts_oldest_entry_when_full() {
        let cache = ReadCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), 1u32);
        sleep(Duration::from_millis(5));
        cache.insert("b".to_string(), 2u32);
        sleep(Duration::from_millis(5));
        cache.insert("c".to_string(), 3u32);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }
}
