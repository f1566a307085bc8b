//! Worker Module
//!
//! The serializing worker is the only code that touches the recency list and
//! the weight/count totals. Callers talk to it through two bounded channels,
//! one for promotions and one for removals. Evicted entries are handed to a
//! second thread that runs the caller's `on_evict` callback.
//!
//! A full notification channel blocks the worker, so a slow callback stalls
//! promotion and removal processing cache-wide. Size `channel_buffer_size`
//! with that in mind.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use crate::cache::entry::Lifecycle;
use crate::cache::lru::RecencyList;
use crate::cache::shard::ShardSet;
use crate::cache::stats::StatsCounters;
use crate::cache::Entry;
use crate::error::Result;

/// Callback invoked with the key and value of every evicted entry.
pub type EvictCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

// == Requests ==
/// Message sent to the worker on either request channel.
pub(crate) enum Request<V> {
    /// Promote or retire this entry, depending on the channel.
    Apply(Arc<Entry<V>>),
    /// Acknowledge once everything queued before this message is applied.
    Sync(Sender<()>),
    /// Drain both channels and stop.
    Shutdown,
}

enum Notice<V> {
    Evicted(Arc<Entry<V>>),
    Sync(Sender<()>),
}

// == Worker ==
/// Owner of the global eviction state.
pub(crate) struct Worker<V> {
    list: RecencyList<Arc<Entry<V>>>,
    /// Wider than a single weight so any number of `u64` weights sums exactly
    weight: u128,
    count: u64,
    max_weight: u64,
    promotion_threshold: u32,
    shards: Arc<ShardSet<V>>,
    stats: Arc<StatsCounters>,
    notices: Option<Sender<Notice<V>>>,
}

impl<V> Worker<V> {
    fn new(
        max_weight: u64,
        promotion_threshold: u32,
        shards: Arc<ShardSet<V>>,
        stats: Arc<StatsCounters>,
        notices: Option<Sender<Notice<V>>>,
    ) -> Self {
        Self {
            list: RecencyList::new(),
            weight: 0,
            count: 0,
            max_weight,
            promotion_threshold,
            shards,
            stats,
            notices,
        }
    }

    // == Promote ==
    /// Applies one promotion request.
    ///
    /// Returns true if the entry was newly admitted to the recency list.
    fn promote(&mut self, entry: &Arc<Entry<V>>) -> bool {
        let mut state = entry.state();
        match state.lifecycle {
            Lifecycle::Retired => false,
            Lifecycle::Linked(id) => {
                state.promotions += 1;
                if state.promotions >= self.promotion_threshold {
                    self.list.move_to_front(id);
                    state.promotions = 0;
                }
                false
            }
            Lifecycle::Fresh => {
                state.lifecycle = Lifecycle::Linked(self.list.push_front(Arc::clone(entry)));
                self.weight += u128::from(entry.weight());
                self.count += 1;
                true
            }
        }
    }

    // == Retire ==
    /// Applies one removal request. Retiring twice is a no-op.
    fn retire(&mut self, entry: &Arc<Entry<V>>) {
        let mut state = entry.state();
        if let Lifecycle::Linked(id) = state.lifecycle {
            self.list.remove(id);
            self.weight -= u128::from(entry.weight());
            self.count -= 1;
        }
        state.lifecycle = Lifecycle::Retired;
    }

    // == Evict ==
    /// Drops least recently used entries until the weight fits again.
    fn evict(&mut self) {
        while self.over_weight() {
            let Some(entry) = self.list.back().and_then(|id| self.list.remove(id)) else {
                debug!(
                    weight = %self.weight,
                    max_weight = self.max_weight,
                    "recency list exhausted while over weight"
                );
                return;
            };

            let was_live = self.shards.shard_for(entry.key()).remove_entry(&entry);
            self.weight -= u128::from(entry.weight());
            self.count -= 1;
            entry.state().lifecycle = Lifecycle::Retired;

            // Already displaced or removed from its shard; its key was not evicted.
            if !was_live {
                trace!(key = entry.key(), "dropped displaced entry");
                continue;
            }

            self.stats.record_eviction();
            trace!(key = entry.key(), weight = entry.weight(), "evicted entry");

            if let Some(notices) = &self.notices {
                if notices.send(Notice::Evicted(entry)).is_err() {
                    warn!("eviction notifier is gone, dropping notification");
                }
            }
        }
    }

    fn handle_promotion(&mut self, request: Request<V>) -> bool {
        match request {
            Request::Apply(entry) => {
                if self.promote(&entry) && self.over_weight() {
                    self.evict();
                }
            }
            // Evictions only come out of promotions, so the notifier has to
            // catch up before this barrier counts as passed.
            Request::Sync(ack) => match &self.notices {
                Some(notices) => {
                    if let Err(err) = notices.send(Notice::Sync(ack)) {
                        if let Notice::Sync(ack) = err.into_inner() {
                            let _ = ack.send(());
                        }
                    }
                }
                None => {
                    let _ = ack.send(());
                }
            },
            Request::Shutdown => return false,
        }
        self.publish();
        true
    }

    fn handle_removal(&mut self, request: Request<V>) -> bool {
        match request {
            Request::Apply(entry) => self.retire(&entry),
            Request::Sync(ack) => {
                let _ = ack.send(());
            }
            Request::Shutdown => return false,
        }
        self.publish();
        true
    }

    fn over_weight(&self) -> bool {
        self.weight > u128::from(self.max_weight)
    }

    /// Totals above `u64::MAX` are reported as `u64::MAX`.
    fn publish(&self) {
        let weight = u64::try_from(self.weight).unwrap_or(u64::MAX);
        self.stats.publish_totals(self.count, weight);
    }

    // == Run ==
    /// Event loop: applies requests from whichever channel is ready.
    fn run(mut self, channels: DrainOnExit<V>) {
        let DrainOnExit {
            promotions,
            removals,
        } = &channels;
        info!(max_weight = self.max_weight, "cache worker started");

        loop {
            let running = select! {
                recv(promotions) -> msg => msg.map(|req| self.handle_promotion(req)).unwrap_or(false),
                recv(removals) -> msg => msg.map(|req| self.handle_removal(req)).unwrap_or(false),
            };
            if !running {
                break;
            }
        }

        for request in removals.try_iter() {
            self.handle_removal(request);
        }
        for request in promotions.try_iter() {
            self.handle_promotion(request);
        }

        info!(
            entries = self.count,
            weight = %self.weight,
            "cache worker stopped"
        );
    }
}

/// Request receivers that drop whatever is still queued when the worker
/// exits, including by unwinding. A queued `Sync` then closes its ack
/// channel instead of leaving the caller waiting forever.
struct DrainOnExit<V> {
    promotions: Receiver<Request<V>>,
    removals: Receiver<Request<V>>,
}

impl<V> Drop for DrainOnExit<V> {
    fn drop(&mut self) {
        self.promotions.try_iter().for_each(drop);
        self.removals.try_iter().for_each(drop);
    }
}

fn run_notifier<V>(notices: Receiver<Notice<V>>, on_evict: EvictCallback<V>) {
    for notice in notices {
        match notice {
            Notice::Evicted(entry) => {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| on_evict(entry.key(), entry.value())));
                if outcome.is_err() {
                    warn!(key = entry.key(), "on_evict callback panicked");
                }
            }
            Notice::Sync(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

// == Spawn ==
/// Settings the worker needs at start-up.
pub(crate) struct WorkerSettings<V> {
    pub(crate) max_weight: u64,
    pub(crate) promotion_threshold: u32,
    pub(crate) channel_buffer_size: usize,
    pub(crate) on_evict: Option<EvictCallback<V>>,
}

/// Sending side of a running worker plus its threads.
pub(crate) struct WorkerHandle<V> {
    pub(crate) promotions: Sender<Request<V>>,
    pub(crate) removals: Sender<Request<V>>,
    pub(crate) worker: JoinHandle<()>,
    pub(crate) notifier: Option<JoinHandle<()>>,
}

/// Starts the worker thread, and the notifier thread if a callback is set.
pub(crate) fn spawn<V>(
    settings: WorkerSettings<V>,
    shards: Arc<ShardSet<V>>,
    stats: Arc<StatsCounters>,
) -> Result<WorkerHandle<V>>
where
    V: Send + Sync + 'static,
{
    let capacity = settings.channel_buffer_size;
    let (promotions_tx, promotions_rx) = crossbeam_channel::bounded(capacity);
    let (removals_tx, removals_rx) = crossbeam_channel::bounded(capacity);

    let (notices, notifier) = match settings.on_evict {
        Some(on_evict) => {
            let (notices_tx, notices_rx) = crossbeam_channel::bounded(capacity);
            let notifier = thread::Builder::new()
                .name("shardlru-notifier".to_string())
                .spawn(move || run_notifier(notices_rx, on_evict))?;
            (Some(notices_tx), Some(notifier))
        }
        None => (None, None),
    };

    let worker = Worker::new(
        settings.max_weight,
        settings.promotion_threshold,
        shards,
        stats,
        notices,
    );
    // If this spawn fails the closure is dropped, which closes the notifier's
    // channel and lets that thread exit on its own.
    let channels = DrainOnExit {
        promotions: promotions_rx,
        removals: removals_rx,
    };
    let worker = thread::Builder::new()
        .name("shardlru-worker".to_string())
        .spawn(move || worker.run(channels))?;

    Ok(WorkerHandle {
        promotions: promotions_tx,
        removals: removals_tx,
        worker,
        notifier,
    })
}
