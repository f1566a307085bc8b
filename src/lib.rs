//! shardlru - An in-process, weight-bounded concurrent LRU cache
//!
//! Keys are spread over independently locked shards. Recency order and the
//! weight/count totals belong to a single worker thread that callers feed
//! through bounded channels, so the hot path never takes a global lock.
//! Entries may carry a TTL; expired entries are dropped lazily on read or by
//! an explicit sweep.
//!
//! ```
//! use std::time::Duration;
//! use shardlru::{Cache, Config};
//!
//! let cache: Cache<String> = Cache::new(100, Config::default()).unwrap();
//! cache.set("a", "alpha".to_string());
//! cache.set_with_ttl("b", "beta".to_string(), Duration::from_secs(30));
//!
//! assert_eq!(cache.get("a").unwrap().value(), "alpha");
//! assert!(cache.remove("b"));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    Cache, CacheBuilder, CacheStats, Clock, Entry, EvictCallback, ManualClock, SystemClock,
    Weighted,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_configured_gc_task, spawn_gc_task};
