use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Why an entry left the cache. Listeners use this to decide whether a
/// removal is an eviction (write-back candidate) or a deliberate removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Evicted to keep the cache within its maximum size.
    Size,
    /// Evicted because its last access is older than the expiry window.
    Expired,
    /// Removed by an explicit invalidation.
    Explicit,
    /// Displaced by a newer value under the same key.
    Replaced,
}

impl RemovalCause {
    pub fn was_evicted(&self) -> bool {
        matches!(self, RemovalCause::Size | RemovalCause::Expired)
    }
}

type Listener<K, V> = Box<dyn Fn(&K, V, RemovalCause) + Send + Sync>;

struct CacheSlot<V> {
    value: V,
    last_access: Instant,
}

/// Bounded, expire-after-access map with a removal listener. Eviction order
/// is least-recently-accessed first. The listener runs outside the map lock,
/// so a slow listener (disk write-back under back-pressure) never stalls
/// concurrent readers.
pub struct SimpleCache<K, V> {
    entries: Mutex<HashMap<K, CacheSlot<V>>>,
    max_size: usize,
    expire_after: Duration,
    listener: Option<Listener<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SimpleCache<K, V> {
    pub fn new(max_size: usize, expire_after: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
            expire_after,
            listener: None,
        }
    }

    pub fn with_listener(
        max_size: usize,
        expire_after: Duration,
        listener: impl Fn(&K, V, RemovalCause) + Send + Sync + 'static,
    ) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::new(max_size, expire_after)
        }
    }

    fn notify(&self, removed: Vec<(K, V, RemovalCause)>) {
        if let Some(listener) = &self.listener {
            for (key, value, cause) in removed {
                listener(&key, value, cause);
            }
        }
    }

    /// Looks up a value and refreshes its last access. An entry past its
    /// expiry window is removed (listener fires with `Expired`) and reads as
    /// absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut removed = Vec::new();
        let result = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            match entries.get_mut(key) {
                None => None,
                Some(slot) => {
                    if slot.last_access.elapsed() > self.expire_after {
                        if let Some(slot) = entries.remove(key) {
                            removed.push((key.clone(), slot.value, RemovalCause::Expired));
                        }
                        None
                    } else {
                        slot.last_access = Instant::now();
                        Some(slot.value.clone())
                    }
                }
            }
        };
        self.notify(removed);
        result
    }

    /// Inserts a value, evicting least-recently-accessed entries while the
    /// cache is over capacity.
    pub fn put(&self, key: K, value: V) {
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            if let Some(old) = entries.insert(
                key.clone(),
                CacheSlot {
                    value,
                    last_access: Instant::now(),
                },
            ) {
                removed.push((key, old.value, RemovalCause::Replaced));
            }

            while entries.len() > self.max_size {
                let lru = entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_access)
                    .map(|(k, _)| k.clone());
                match lru {
                    Some(k) => {
                        if let Some(slot) = entries.remove(&k) {
                            removed.push((k, slot.value, RemovalCause::Size));
                        }
                    }
                    None => break,
                }
            }
        }
        self.notify(removed);
    }

    /// Removes a single entry; the listener fires with `Explicit`.
    pub fn invalidate(&self, key: &K) {
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            if let Some(slot) = entries.remove(key) {
                removed.push((key.clone(), slot.value, RemovalCause::Explicit));
            }
        }
        self.notify(removed);
    }

    /// Removes every entry whose last access is past the expiry window.
    pub fn cleanup(&self) {
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            let expired: Vec<K> = entries
                .iter()
                .filter(|(_, slot)| slot.last_access.elapsed() > self.expire_after)
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                if let Some(slot) = entries.remove(&key) {
                    removed.push((key, slot.value, RemovalCause::Expired));
                }
            }
        }
        self.notify(removed);
    }

    /// Empties the cache without firing the listener; used by the shutdown
    /// flush, which persists entries itself.
    pub fn drain(&self) -> Vec<(K, V)> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .drain()
            .map(|(key, slot)| (key, slot.value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
