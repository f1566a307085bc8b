//! Cache Module
//!
//! Sharded storage, the arena recency list and the serializing worker that
//! together make up the weight-bounded LRU cache.

mod builder;
mod clock;
mod entry;
mod lru;
mod shard;
mod stats;
mod store;
mod weight;
mod worker;


// Re-export public types
pub use builder::CacheBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::Entry;
pub use stats::CacheStats;
pub use store::Cache;
pub use weight::Weighted;
pub use worker::EvictCallback;
