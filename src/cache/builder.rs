//! Cache Builder Module

use std::sync::Arc;

use crate::cache::worker::EvictCallback;
use crate::cache::{Cache, Clock, SystemClock, Weighted};
use crate::config::Config;
use crate::error::Result;

/// Builder for configuring a [`Cache`].
///
/// # Example
///
/// ```
/// use shardlru::CacheBuilder;
///
/// let cache = CacheBuilder::<String>::new(1_000)
///     .shards(64)
///     .promotion_threshold(3)
///     .on_evict(|key, value| println!("evicted {key} = {value}"))
///     .build()
///     .unwrap();
///
/// cache.set("greeting", "hello".to_string());
/// ```
pub struct CacheBuilder<V> {
    max_weight: u64,
    config: Config,
    clock: Arc<dyn Clock>,
    on_evict: Option<EvictCallback<V>>,
}

impl<V> CacheBuilder<V>
where
    V: Weighted + Send + Sync + 'static,
{
    /// Create a new builder with the given maximum total weight.
    pub fn new(max_weight: u64) -> Self {
        Self {
            max_weight,
            config: Config::default(),
            clock: Arc::new(SystemClock),
            on_evict: None,
        }
    }

    /// Replace all numeric options at once.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the number of shards. Must be a power of two.
    ///
    /// Default: 32 shards
    pub fn shards(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set how many accesses it takes to move an entry to the front.
    ///
    /// Default: 1 (every access)
    pub fn promotion_threshold(mut self, threshold: u32) -> Self {
        self.config.promotion_threshold = threshold;
        self
    }

    /// Set the capacity of the worker and notification channels.
    ///
    /// Default: 1024
    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.config.channel_buffer_size = size;
        self
    }

    /// Use a different time source for TTLs.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Call `callback` with the key and value of every evicted entry.
    ///
    /// Not called for explicit removals, overwrites or expirations. The
    /// callback runs on its own thread, but a callback slower than the
    /// eviction rate eventually blocks the worker.
    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(callback));
        self
    }

    /// Build the cache and start its background threads.
    pub fn build(self) -> Result<Cache<V>> {
        Cache::start(self.max_weight, self.config, self.clock, self.on_evict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_builder_applies_options() {
        let cache = CacheBuilder::<u32>::new(10)
            .shards(8)
            .promotion_threshold(2)
            .channel_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(cache.max_weight(), 10);
        assert_eq!(cache.shard_count(), 8);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = CacheBuilder::<u32>::new(10).shards(6).build();
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }
}
