//! Configuration Module
//!
//! Tuning knobs for the cache, loadable from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Defaults ==
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 1;
pub const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_SHARD_COUNT: usize = 32;
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 60;

/// Cache configuration parameters.
///
/// The eviction callback and the clock are not plain data and are set on
/// [`CacheBuilder`](crate::CacheBuilder) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Accesses needed before an entry is actually moved to the front
    pub promotion_threshold: u32,
    /// Capacity of each worker channel
    pub channel_buffer_size: usize,
    /// Number of shards, a power of two
    pub shard_count: usize,
    /// Interval in seconds for the periodic sweep task
    pub gc_interval_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SHARDLRU_PROMOTION_THRESHOLD` - Accesses per promotion (default: 1)
    /// - `SHARDLRU_CHANNEL_BUFFER` - Worker channel capacity (default: 1024)
    /// - `SHARDLRU_SHARD_COUNT` - Number of shards (default: 32)
    /// - `SHARDLRU_GC_INTERVAL` - Sweep interval in seconds (default: 60)
    pub fn from_env() -> Self {
        Self {
            promotion_threshold: env_or("SHARDLRU_PROMOTION_THRESHOLD", DEFAULT_PROMOTION_THRESHOLD),
            channel_buffer_size: env_or("SHARDLRU_CHANNEL_BUFFER", DEFAULT_CHANNEL_BUFFER_SIZE),
            shard_count: env_or("SHARDLRU_SHARD_COUNT", DEFAULT_SHARD_COUNT),
            gc_interval_secs: env_or("SHARDLRU_GC_INTERVAL", DEFAULT_GC_INTERVAL_SECS),
        }
    }

    /// Checks the values the cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "shard_count must be a power of two, got {}",
                self.shard_count
            )));
        }
        if self.promotion_threshold == 0 {
            return Err(CacheError::InvalidConfig(
                "promotion_threshold must be at least 1".to_string(),
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(CacheError::InvalidConfig(
                "channel_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.gc_interval_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "gc_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Period of the sweep started by
    /// [`spawn_configured_gc_task`](crate::tasks::spawn_configured_gc_task).
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER_SIZE,
            shard_count: DEFAULT_SHARD_COUNT,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
