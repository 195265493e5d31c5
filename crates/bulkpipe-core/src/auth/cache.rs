//! Bounded expire-after-write cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    written_at: Instant,
}

/// Process-local cache with an optional size bound and an optional
/// expire-after-write TTL. When full, the oldest write is evicted.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    max_entries: Option<usize>,
    ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// `max_entries` of `None` or `Some(0)` means unbounded.
    pub fn new(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.filter(|n| *n > 0),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.written_at) >= ttl)
    }

    /// Fresh value for `key`, dropping it if expired.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let expired = self.entries.get(key).map(|e| self.is_expired(e, now))?;
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        let now = Instant::now();
        if let Some(ttl) = self.ttl {
            self.entries
                .retain(|_, e| now.duration_since(e.written_at) < ttl);
        }
        if let Some(max) = self.max_entries {
            while self.entries.len() >= max && !self.entries.contains_key(&key) {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.written_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        self.entries.remove(&k);
                    }
                    None => break,
                }
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                written_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
