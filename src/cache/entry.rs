//! Cache Entry Module
//!
//! Defines the unit of storage: key, value, weight, expiration and the
//! bookkeeping state owned by the serializing worker.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::cache::lru::NodeId;
use crate::cache::Weighted;

// == Lifecycle ==
/// Where an entry stands with respect to the recency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    /// Stored in a shard but not yet admitted to the recency list.
    Fresh,
    /// Linked into the recency list and counted in the totals.
    Linked(NodeId),
    /// Removed, overwritten, expired or evicted. Terminal.
    Retired,
}

/// Worker-owned mutable part of an entry.
#[derive(Debug)]
pub(crate) struct EntryState {
    pub(crate) lifecycle: Lifecycle,
    /// Accesses since the entry last moved to the front.
    pub(crate) promotions: u32,
}

// == Cache Entry ==
/// A single cached value and its metadata.
///
/// Entries are immutable from the caller's point of view; a new value for the
/// same key produces a new entry and retires the old one.
#[derive(Debug)]
pub struct Entry<V> {
    key: String,
    value: V,
    weight: u64,
    /// Absolute expiration in clock nanoseconds, None = never expires
    expires_at: Option<u64>,
    state: Mutex<EntryState>,
}

impl<V: Weighted> Entry<V> {
    // == Constructor ==
    /// Creates a fresh entry, taking its weight from the value.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `value` - The cached value
    /// * `expires_at` - Absolute expiration in nanoseconds, or None
    pub(crate) fn new(key: String, value: V, expires_at: Option<u64>) -> Self {
        let weight = value.weight();
        Self {
            key,
            value,
            weight,
            expires_at,
            state: Mutex::new(EntryState {
                lifecycle: Lifecycle::Fresh,
                promotions: 0,
            }),
        }
    }
}

impl<V> Entry<V> {
    /// The key this entry was stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Cost of this entry against the cache's maximum weight.
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Absolute expiration timestamp in nanoseconds, or None if immortal.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now_nanos`.
    ///
    /// An entry is expired once the clock reaches its expiration timestamp,
    /// so a zero TTL expires immediately.
    pub fn is_expired(&self, now_nanos: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_nanos >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime at `now_nanos`.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a TTL that hasn't elapsed
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self, now_nanos: u64) -> Option<Duration> {
        self.expires_at
            .map(|expires| Duration::from_nanos(expires.saturating_sub(now_nanos)))
    }

    /// True once the entry has been removed, overwritten, expired or evicted.
    pub fn is_retired(&self) -> bool {
        self.state.lock().lifecycle == Lifecycle::Retired
    }

    /// Locks the worker-owned state. Only the worker calls this on live entries.
    pub(crate) fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }
}

// == Utility Functions ==
/// Computes the absolute expiration for a TTL starting at `now_nanos`.
pub(crate) fn expiration_from(now_nanos: u64, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| now_nanos.saturating_add(ttl.as_nanos().min(u64::MAX as u128) as u64))
}
