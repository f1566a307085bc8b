//! Cache Store Module
//!
//! The `Cache` orchestrator: routes reads and writes to shards and forwards
//! the resulting promotions and removals to the serializing worker.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::cache::shard::ShardSet;
use crate::cache::stats::StatsCounters;
use crate::cache::worker::{self, EvictCallback, Request, WorkerSettings};
use crate::cache::{CacheBuilder, CacheStats, Clock, Entry, Weighted};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// How often a waiting `run_pending_tasks` checks that the worker is alive
const LIVENESS_POLL: Duration = Duration::from_millis(50);

// == Cache ==
/// Weight-bounded concurrent LRU cache with optional per-entry TTL.
///
/// Share it across threads with `Arc<Cache<V>>`. Reads and writes only lock
/// the shard owning the key; recency and weight bookkeeping happen
/// asynchronously on the worker thread, so `size` and `total_weight` trail
/// the latest writes until the worker catches up (see
/// [`run_pending_tasks`](Cache::run_pending_tasks)).
///
/// Dropping the cache drains outstanding requests and joins its threads.
pub struct Cache<V> {
    shards: Arc<ShardSet<V>>,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsCounters>,
    promotions: Sender<Request<V>>,
    removals: Sender<Request<V>>,
    worker_thread: Option<JoinHandle<()>>,
    notifier_thread: Option<JoinHandle<()>>,
    max_weight: u64,
    gc_interval: Duration,
}

impl<V> Cache<V>
where
    V: Weighted + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `max_weight` total weight.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation, `WorkerSpawn` if the
    /// background threads cannot be started.
    pub fn new(max_weight: u64, config: Config) -> Result<Self> {
        CacheBuilder::new(max_weight).config(config).build()
    }

    /// Starts a builder for a cache holding at most `max_weight`.
    pub fn builder(max_weight: u64) -> CacheBuilder<V> {
        CacheBuilder::new(max_weight)
    }

    pub(crate) fn start(
        max_weight: u64,
        config: Config,
        clock: Arc<dyn Clock>,
        on_evict: Option<EvictCallback<V>>,
    ) -> Result<Self> {
        config.validate()?;

        let shards = Arc::new(ShardSet::new(config.shard_count, Arc::clone(&clock)));
        let stats = Arc::new(StatsCounters::default());
        let handle = worker::spawn(
            WorkerSettings {
                max_weight,
                promotion_threshold: config.promotion_threshold,
                channel_buffer_size: config.channel_buffer_size,
                on_evict,
            },
            Arc::clone(&shards),
            Arc::clone(&stats),
        )?;

        debug!(
            max_weight,
            shards = config.shard_count,
            promotion_threshold = config.promotion_threshold,
            "cache created"
        );

        Ok(Self {
            shards,
            clock,
            stats,
            promotions: handle.promotions,
            removals: handle.removals,
            worker_thread: Some(handle.worker),
            notifier_thread: handle.notifier,
            max_weight,
            gc_interval: config.gc_interval(),
        })
    }

    // == Set ==
    /// Stores a value that never expires.
    ///
    /// If the key already exists, the old entry is retired and replaced.
    pub fn set(&self, key: impl Into<String>, value: V) -> Arc<Entry<V>> {
        self.insert(key.into(), value, None)
    }

    /// Stores a value that expires `ttl` from now.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> Arc<Entry<V>> {
        self.insert(key.into(), value, Some(ttl))
    }

    fn insert(&self, key: String, value: V, ttl: Option<Duration>) -> Arc<Entry<V>> {
        let (entry, displaced) = self.shards.shard_for(&key).set(key, value, ttl);
        if let Some(displaced) = displaced {
            self.enqueue(&self.removals, displaced);
        }
        self.enqueue(&self.promotions, Arc::clone(&entry));
        entry
    }
}

impl<V> Cache<V> {
    // == Get ==
    /// Retrieves the entry for `key`.
    ///
    /// Returns None if the key is absent or expired. An expired entry is
    /// dropped from its shard on the spot.
    pub fn get(&self, key: &str) -> Option<Arc<Entry<V>>> {
        let shard = self.shards.shard_for(key);
        let Some(entry) = shard.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired(self.clock.now_nanos()) {
            if shard.remove_entry(&entry) {
                self.stats.record_expirations(1);
                self.enqueue(&self.removals, entry);
            }
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.enqueue(&self.promotions, Arc::clone(&entry));
        Some(entry)
    }

    // == Remove ==
    /// Removes `key`, returning true if something was stored under it.
    ///
    /// Explicit removals never trigger the eviction callback.
    pub fn remove(&self, key: &str) -> bool {
        match self.shards.shard_for(key).remove(key) {
            Some(entry) => {
                self.enqueue(&self.removals, entry);
                true
            }
            None => false,
        }
    }

    // == Manual GC ==
    /// Sweeps expired entries out of every shard.
    ///
    /// Swept entries are retired through the worker like any other removal;
    /// unexpired and immortal entries are never touched.
    ///
    /// # Returns
    /// The number of entries swept.
    pub fn manual_gc(&self) -> usize {
        let now = self.clock.now_nanos();
        let mut swept = 0;
        for shard in self.shards.iter() {
            for entry in shard.sweep_expired(now) {
                self.enqueue(&self.removals, entry);
                swept += 1;
            }
        }

        self.stats.record_expirations(swept as u64);
        if swept > 0 {
            info!("Expiry sweep: removed {} expired entries", swept);
        } else {
            debug!("Expiry sweep: no expired entries found");
        }
        swept
    }

    // == Run Pending Tasks ==
    /// Blocks until the worker has applied every request queued before this
    /// call and every resulting eviction callback has run.
    ///
    /// # Errors
    /// `WorkerStopped` if the worker thread has exited, including after a
    /// panic while applying a request.
    pub fn run_pending_tasks(&self) -> Result<()> {
        let (promoted_tx, promoted_rx) = crossbeam_channel::bounded(1);
        let (removed_tx, removed_rx) = crossbeam_channel::bounded(1);

        self.promotions
            .send(Request::Sync(promoted_tx))
            .map_err(|_| CacheError::WorkerStopped)?;
        self.removals
            .send(Request::Sync(removed_tx))
            .map_err(|_| CacheError::WorkerStopped)?;

        self.wait_for_ack(&promoted_rx)?;
        self.wait_for_ack(&removed_rx)
    }

    /// Waits for a barrier ack, giving up once the worker thread is gone.
    fn wait_for_ack(&self, ack: &Receiver<()>) -> Result<()> {
        loop {
            match ack.recv_timeout(LIVENESS_POLL) {
                Ok(()) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(CacheError::WorkerStopped),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.worker_running() {
                        // The ack may have landed between the timeout and the check.
                        return ack.try_recv().map_err(|_| CacheError::WorkerStopped);
                    }
                }
            }
        }
    }

    fn worker_running(&self) -> bool {
        self.worker_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Length ==
    /// Number of entries currently accounted for by the worker.
    pub fn size(&self) -> usize {
        self.stats.entries() as usize
    }

    /// Summed weight of the entries currently accounted for by the worker.
    pub fn total_weight(&self) -> u64 {
        self.stats.weight()
    }

    pub fn max_weight(&self) -> u64 {
        self.max_weight
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Sweep period taken from [`Config::gc_interval_secs`].
    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Drains outstanding requests and stops the background threads.
    pub fn shutdown(self) {
        drop(self);
    }

    /// Blocks on a full channel; that is the backpressure on callers.
    fn enqueue(&self, channel: &Sender<Request<V>>, entry: Arc<Entry<V>>) {
        if channel.send(Request::Apply(entry)).is_err() {
            warn!("cache worker is not running, dropping request");
        }
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        let _ = self.promotions.send(Request::Shutdown);
        // The worker goes first; it closes the notifier's channel on exit.
        let threads = [self.worker_thread.take(), self.notifier_thread.take()];
        for handle in threads.into_iter().flatten() {
            if handle.join().is_err() {
                warn!("cache background thread panicked");
            }
        }
    }
}
