//! Bounded TTL caches and the action debouncer
//!
//! Process-local maps guarded by a mutex. Entries expire against an
//! injected [`Clock`] so expiry can be driven by tests.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::utils::clock::SharedClock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Map whose entries expire after a fixed TTL. When full, expired entries
/// are purged first, then the entry closest to expiry is evicted.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    max_entries: usize,
    clock: SharedClock,
    entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, ttl_seconds: u64, max_entries: usize, clock: SharedClock) -> Self {
        Self {
            name,
            ttl: Duration::seconds(ttl_seconds as i64),
            max_entries: max_entries.max(1),
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Live value for a key; an expired entry is dropped on access
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.lock();

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn remove(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Empty the cache, returning how many entries were dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        debug!(cache = self.name, cleared = count, "Cache cleared");
        count
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(cache = self.name, removed, remaining = entries.len(), "Purged expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Key of a debounced moderation action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DebounceKey {
    /// Action against a message sender
    Sender { chat_id: i64, user_id: i64 },
    /// Action against a user mentioned in a message
    Mention { chat_id: i64, user_id: i64 },
}

impl DebounceKey {
    pub fn sender(chat_id: i64, user_id: i64) -> Self {
        DebounceKey::Sender { chat_id, user_id }
    }

    pub fn mention(chat_id: i64, user_id: i64) -> Self {
        DebounceKey::Mention { chat_id, user_id }
    }
}

/// Suppresses repeated actions for the same key within a window
#[derive(Debug, Clone)]
pub struct Debouncer {
    recent: TtlCache<DebounceKey, ()>,
}

impl Debouncer {
    pub fn new(window_seconds: u64, max_entries: usize, clock: SharedClock) -> Self {
        Self {
            recent: TtlCache::new("debounce", window_seconds, max_entries, clock),
        }
    }

    /// True when the key was not seen within the window; marks it as seen
    pub fn try_acquire(&self, key: DebounceKey) -> bool {
        if self.recent.get(&key).is_some() {
            return false;
        }
        self.recent.insert(key, ());
        true
    }

    pub fn release(&self, key: &DebounceKey) {
        self.recent.remove(key);
    }

    pub fn purge_expired(&self) -> usize {
        self.recent.purge_expired()
    }

    pub fn clear(&self) -> usize {
        self.recent.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn clock() -> (ManualClock, SharedClock) {
        let clock = ManualClock::default();
        let shared: SharedClock = Arc::new(clock.clone());
        (clock, shared)
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let (manual, shared) = clock();
        let cache = TtlCache::new("test", 10, 100, shared);

        cache.insert(1i64, "clean");
        assert_eq!(cache.get(&1), Some("clean"));

        manual.advance(Duration::seconds(9));
        assert_eq!(cache.get(&1), Some("clean"));

        manual.advance(Duration::seconds(1));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (manual, shared) = clock();
        let cache = TtlCache::new("test", 60, 2, shared);

        cache.insert(1i64, 1);
        manual.advance(Duration::seconds(1));
        cache.insert(2, 2);
        manual.advance(Duration::seconds(1));
        cache.insert(3, 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn test_purge_and_clear() {
        let (manual, shared) = clock();
        let cache = TtlCache::new("test", 5, 10, shared);
        cache.insert("a", 1);
        cache.insert("b", 2);

        manual.advance(Duration::seconds(6));
        cache.insert("c", 3);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.clear(), 1);
    }

    #[test]
    fn test_debouncer_window() {
        let (manual, shared) = clock();
        let debouncer = Debouncer::new(60, 100, shared);

        assert!(debouncer.try_acquire(DebounceKey::sender(-1, 7)));
        assert!(!debouncer.try_acquire(DebounceKey::sender(-1, 7)));
        // mention key is independent of the sender key
        assert!(debouncer.try_acquire(DebounceKey::mention(-1, 7)));

        manual.advance(Duration::seconds(61));
        assert!(debouncer.try_acquire(DebounceKey::sender(-1, 7)));
    }
}
