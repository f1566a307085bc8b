//! Shard Module
//!
//! Lock-striped key to entry storage. Shards know nothing about recency or
//! weight; they only hold the mapping.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

use fnv::FnvHasher;
use parking_lot::RwLock;

use crate::cache::entry::expiration_from;
use crate::cache::{Clock, Entry, Weighted};

// == Shard ==
/// An independently locked mapping for the keys hashed to it.
pub(crate) struct Shard<V> {
    entries: RwLock<HashMap<String, Arc<Entry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Shard<V> {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    // == Get ==
    /// Looks up a key without checking expiration.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<Entry<V>>> {
        self.entries.read().get(key).cloned()
    }

    // == Remove ==
    /// Deletes the mapping for `key` and returns what was stored.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<Entry<V>>> {
        self.entries.write().remove(key)
    }

    // == Remove Entry ==
    /// Deletes the mapping for `entry.key()` only if it still points at `entry`.
    ///
    /// Returns false if the key is absent or now maps to a newer entry.
    pub(crate) fn remove_entry(&self, entry: &Arc<Entry<V>>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(entry.key()) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                entries.remove(entry.key());
                true
            }
            _ => false,
        }
    }

    // == Sweep Expired ==
    /// Drops every entry that has expired at `now_nanos`.
    ///
    /// Expired candidates are gathered under the read lock; the write lock is
    /// only taken when there is something to drop, and an entry replaced in
    /// between is left alone.
    pub(crate) fn sweep_expired(&self, now_nanos: u64) -> Vec<Arc<Entry<V>>> {
        let expired: Vec<Arc<Entry<V>>> = self
            .entries
            .read()
            .values()
            .filter(|entry| entry.is_expired(now_nanos))
            .cloned()
            .collect();

        if expired.is_empty() {
            return expired;
        }

        let mut entries = self.entries.write();
        expired
            .into_iter()
            .filter(|stale| match entries.get(stale.key()) {
                Some(current) if Arc::ptr_eq(current, stale) => {
                    entries.remove(stale.key());
                    true
                }
                _ => false,
            })
            .collect()
    }

    /// Number of mappings, including expired ones not yet purged.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<V: Weighted> Shard<V> {
    // == Set ==
    /// Stores a new entry for `key`, returning it and the entry it displaced.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional lifetime measured from now; None never expires
    pub(crate) fn set(
        &self,
        key: String,
        value: V,
        ttl: Option<Duration>,
    ) -> (Arc<Entry<V>>, Option<Arc<Entry<V>>>) {
        let expires_at = expiration_from(self.clock.now_nanos(), ttl);
        let entry = Arc::new(Entry::new(key, value, expires_at));
        // One locked insert, so `previous` is exactly the entry this write replaced.
        let previous = self
            .entries
            .write()
            .insert(entry.key().to_string(), Arc::clone(&entry));
        (entry, previous)
    }
}

// == Shard Set ==
/// The fixed array of shards and the key routing over it.
pub(crate) struct ShardSet<V> {
    shards: Box<[Shard<V>]>,
    mask: u32,
}

impl<V> ShardSet<V> {
    /// Creates `count` shards. `count` must be a power of two.
    pub(crate) fn new(count: usize, clock: Arc<dyn Clock>) -> Self {
        debug_assert!(count.is_power_of_two());
        let shards = (0..count)
            .map(|_| Shard::new(Arc::clone(&clock)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            mask: (count - 1) as u32,
        }
    }

    /// Picks the shard owning `key`.
    pub(crate) fn shard_for(&self, key: &str) -> &Shard<V> {
        &self.shards[(hash_key(key) & self.mask) as usize]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Shard<V>> {
        self.shards.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.len()
    }
}

/// 32-bit routing hash of a key (FNV-1a, folded to 32 bits).
fn hash_key(key: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    let hash = hasher.finish();
    // Only the shard distribution depends on this, never a stored hash.
    (hash ^ (hash >> 32)) as u32
}
