//! Expiry Sweep Task
//!
//! Background task that periodically sweeps expired entries out of a cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that calls [`Cache::manual_gc`] every `interval`.
///
/// The sweep takes shard locks and may block on the worker's removal
/// channel, so it runs on the blocking pool rather than on a runtime thread.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::<String>::new(1000, Config::default())?);
/// let gc_handle = spawn_gc_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// gc_handle.abort();
/// ```
pub fn spawn_gc_task<V>(cache: Arc<Cache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {:?}",
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let sweeper = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || sweeper.manual_gc()).await {
                Ok(swept) => debug!("Expiry sweep task pass finished, {} swept", swept),
                Err(err) => {
                    info!("Expiry sweep task stopping: {}", err);
                    break;
                }
            }
        }
    })
}

/// Spawns the sweep task at the cache's configured
/// [`gc_interval_secs`](crate::Config::gc_interval_secs).
pub fn spawn_configured_gc_task<V>(cache: Arc<Cache<V>>) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    let interval = cache.gc_interval();
    spawn_gc_task(cache, interval)
}
