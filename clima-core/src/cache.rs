//! In-memory time-bounded cache used for geocoding results and aggregated
//! weather reports.
//!
//! Entries are visible only while `now < inserted_at + ttl`; an expired
//! entry is treated as absent whether or not it has been purged yet.
//! Eviction policy, in order: expired entries first, then the
//! least-recently-inserted live entry. Re-inserting a key refreshes its
//! position in the eviction queue.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.inserted_at) < ttl
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Insertion order, oldest at the front. Scans are bounded by the
    /// fixed capacity, so they stay cheap.
    order: VecDeque<K>,
}

/// Capacity-bounded key→value store with a single TTL for all entries.
///
/// Interior mutability behind one mutex so a shared reference can be used
/// from concurrent requests; the critical section only touches the map.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> std::fmt::Debug for Inner<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Look up a value, cloning it out. An expired entry counts as a miss
    /// and is removed on the way.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Expired: logically absent already, so drop it on the way out.
        inner.entries.remove(key);
        inner.order.retain(|k| k != key);
        None
    }

    /// Insert a value, evicting if the capacity bound is reached.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.lock();
        let now = Instant::now();

        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.entries.len() >= self.capacity {
            Self::purge_expired(&mut inner, now, self.ttl);
            while inner.entries.len() >= self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: now,
            },
        );
        inner.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(inner: &mut Inner<K, V>, now: Instant, ttl: Duration) {
        let entries = &mut inner.entries;
        entries.retain(|_, entry| entry.is_fresh(now, ttl));
        inner.order.retain(|k| entries.contains_key(k));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    const LONG_TTL: Duration = Duration::from_secs(60);

    #[test]
    fn get_returns_none_for_missing_key() {
        let cache: TtlCache<String, i32> = TtlCache::new(4, LONG_TTL);
        assert_eq!(cache.get(&"nope".to_string()), None);
    }

    #[test]
    fn put_then_get_roundtrip() {
        let cache = TtlCache::new(4, LONG_TTL);
        cache.put("bogota", 18);
        assert_eq!(cache.get(&"bogota"), Some(18));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_absent_and_purged() {
        let cache = TtlCache::new(4, Duration::ZERO);
        cache.put("bogota", 18);
        thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.get(&"bogota"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_insert_is_evicted_at_capacity() {
        let cache = TtlCache::new(2, LONG_TTL);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_refreshes_eviction_position() {
        let cache = TtlCache::new(2, LONG_TTL);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        cache.put("c", 3);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn expired_entries_free_slots_before_live_eviction() {
        let cache = TtlCache::new(2, Duration::ZERO);
        cache.put("a", 1);
        cache.put("b", 2);
        thread::sleep(Duration::from_millis(5));

        cache.put("c", 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn cache_is_shareable_across_threads() {
        let cache = Arc::new(TtlCache::new(16, LONG_TTL));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.put(format!("key-{i}"), i);
                    cache.get(&format!("key-{i}"))
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().expect("thread"), Some(i as i32));
        }
    }
}
