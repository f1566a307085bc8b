//! Integration Tests for the Cache
//!
//! Exercise the public API end to end: TTLs on a manual clock, eviction
//! order, the eviction callback, removal and sweeping, and concurrent use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use shardlru::{Cache, CacheError, Config, ManualClock, Weighted};
use tokio_test::assert_ok;

// == Helper Functions ==

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "shardlru=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

type Evictions = Arc<Mutex<Vec<(String, String)>>>;

fn cache_with_evictions(max_weight: u64) -> (Arc<ManualClock>, Evictions, Cache<String>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let evicted: Evictions = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    let cache = Cache::builder(max_weight)
        .clock(clock.clone())
        .on_evict(move |key, value: &String| {
            sink.lock().unwrap().push((key.to_string(), value.clone()));
        })
        .build()
        .unwrap();
    (clock, evicted, cache)
}

#[derive(Debug)]
struct Payload {
    bytes: u64,
}

impl Weighted for Payload {
    fn weight(&self) -> u64 {
        self.bytes
    }
}

// == TTL ==

#[test]
fn test_ttl_entry_expires_after_duration() {
    let (clock, _, cache) = cache_with_evictions(5);

    cache.set_with_ttl("toExpire", "hahaha".to_string(), Duration::from_secs(1));
    let entry = cache.get("toExpire").expect("entry should be readable before its TTL");
    assert_eq!(entry.value(), "hahaha");

    clock.advance(Duration::from_secs(1));
    assert!(cache.get("toExpire").is_none());
}

#[test]
fn test_entry_without_ttl_never_expires() {
    let (clock, _, cache) = cache_with_evictions(5);
    cache.set("forever", "value".to_string());

    clock.advance(Duration::from_secs(60 * 60 * 24 * 365));

    assert_eq!(cache.get("forever").unwrap().value(), "value");
}

#[test]
fn test_expired_read_reclaims_weight() {
    let (clock, evicted, cache) = cache_with_evictions(5);
    cache.set_with_ttl("short", "v".to_string(), Duration::from_millis(10));
    assert_ok!(cache.run_pending_tasks());
    assert_eq!(cache.total_weight(), 1);

    clock.advance(Duration::from_millis(10));
    assert!(cache.get("short").is_none());
    assert_ok!(cache.run_pending_tasks());

    assert_eq!(cache.total_weight(), 0);
    assert_eq!(cache.size(), 0);
    assert!(evicted.lock().unwrap().is_empty(), "expiry is not an eviction");
}

// == Eviction ==

#[test]
fn test_least_recently_used_key_is_evicted() {
    let (_, evicted, cache) = cache_with_evictions(5);

    for i in 0..5 {
        cache.set(i.to_string(), i.to_string());
    }
    cache.set("toEvict", "haha".to_string());
    assert_ok!(cache.run_pending_tasks());

    assert!(cache.get("0").is_none());
    for key in ["1", "2", "3", "4", "toEvict"] {
        assert!(cache.get(key).is_some(), "{} should still be cached", key);
    }
    assert_eq!(cache.size(), 5);
    assert_eq!(cache.total_weight(), 5);
    assert_eq!(
        *evicted.lock().unwrap(),
        vec![("0".to_string(), "0".to_string())]
    );
}

#[test]
fn test_weighted_values_drive_eviction() {
    init_tracing();
    let cache: Cache<Payload> = Cache::new(10, Config::default()).unwrap();

    cache.set("a", Payload { bytes: 4 });
    cache.set("b", Payload { bytes: 4 });
    assert_ok!(cache.run_pending_tasks());
    assert_eq!(cache.total_weight(), 8);

    cache.set("c", Payload { bytes: 4 });
    assert_ok!(cache.run_pending_tasks());

    assert!(cache.get("a").is_none());
    assert_eq!(cache.total_weight(), 8);
    assert_eq!(cache.size(), 2);
}

#[test]
fn test_entry_heavier_than_max_does_not_stick() {
    init_tracing();
    let cache: Cache<Payload> = Cache::new(10, Config::default()).unwrap();

    cache.set("small", Payload { bytes: 2 });
    cache.set("huge", Payload { bytes: 50 });
    assert_ok!(cache.run_pending_tasks());

    assert!(cache.total_weight() <= cache.max_weight());
    assert!(cache.get("huge").is_none());
}

#[test]
fn test_huge_weights_still_evict_without_overflow() {
    init_tracing();
    const HALF: u64 = 1 << 63;
    let cache: Cache<Payload> = Cache::new(u64::MAX, Config::default()).unwrap();

    cache.set("a", Payload { bytes: HALF });
    cache.set("b", Payload { bytes: HALF });
    assert_ok!(cache.run_pending_tasks());

    // The two weights sum past u64::MAX, so the older one has to go.
    assert!(cache.get("a").is_none());
    assert!(cache.get("b").is_some());
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.total_weight(), HALF);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_on_evict_reports_last_value_once() {
    let (_, evicted, cache) = cache_with_evictions(2);

    cache.set("a", "first".to_string());
    cache.set("a", "second".to_string());
    cache.set("b", "b".to_string());
    assert_ok!(cache.run_pending_tasks());
    cache.set("c", "c".to_string());
    assert_ok!(cache.run_pending_tasks());

    let evicted = evicted.lock().unwrap();
    assert_eq!(*evicted, vec![("a".to_string(), "second".to_string())]);
}

#[test]
fn test_on_evict_not_called_for_remove() {
    let (_, evicted, cache) = cache_with_evictions(2);

    cache.set("a", "a".to_string());
    cache.set("b", "b".to_string());
    assert!(cache.remove("a"));
    assert!(cache.remove("b"));
    assert_ok!(cache.run_pending_tasks());

    assert!(evicted.lock().unwrap().is_empty());
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_promotion_threshold_delays_reordering() {
    init_tracing();
    let cache: Cache<String> = Cache::builder(3)
        .promotion_threshold(2)
        .build()
        .unwrap();

    cache.set("a", "a".to_string());
    cache.set("b", "b".to_string());
    cache.set("c", "c".to_string());
    assert_ok!(cache.run_pending_tasks());

    // One read is below the threshold, so "a" stays least recently used.
    cache.get("a");
    assert_ok!(cache.run_pending_tasks());
    cache.set("d", "d".to_string());
    assert_ok!(cache.run_pending_tasks());
    assert!(cache.get("a").is_none());

    // Two reads reach it and move "b" to the front.
    cache.get("b");
    cache.get("b");
    assert_ok!(cache.run_pending_tasks());
    cache.set("e", "e".to_string());
    assert_ok!(cache.run_pending_tasks());
    assert!(cache.get("b").is_some());
    assert!(cache.get("c").is_none());
}

// == Removal ==

#[test]
fn test_remove_retires_entry() {
    let (_, _, cache) = cache_with_evictions(5);
    let entry = cache.set("k", "v".to_string());
    cache.get("k");
    cache.get("k");

    assert!(cache.remove("k"));
    assert!(cache.get("k").is_none());
    assert_ok!(cache.run_pending_tasks());

    assert!(entry.is_retired());
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.total_weight(), 0);
    assert!(!cache.remove("k"));
}

// == Manual Sweep ==

#[test]
fn test_manual_gc_only_drops_expired() {
    let (clock, _, cache) = cache_with_evictions(10);
    cache.set_with_ttl("a", "a".to_string(), Duration::from_secs(1));
    cache.set_with_ttl("b", "b".to_string(), Duration::from_secs(100));
    cache.set("c", "c".to_string());
    assert_ok!(cache.run_pending_tasks());
    let before = cache.total_weight();

    assert_eq!(cache.manual_gc(), 0);
    assert_ok!(cache.run_pending_tasks());
    assert_eq!(cache.total_weight(), before);

    clock.advance(Duration::from_secs(5));
    assert_eq!(cache.manual_gc(), 1);
    assert_ok!(cache.run_pending_tasks());

    assert!(cache.get("b").is_some());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.size(), 2);
}

// == Construction ==

#[test]
fn test_invalid_shard_count_rejected() {
    let config = Config {
        shard_count: 30,
        ..Config::default()
    };
    let result = Cache::<String>::new(10, config);
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
}

// == Concurrency ==

#[test]
fn test_concurrent_writers_keep_totals_consistent() {
    init_tracing();
    let cache: Arc<Cache<u64>> = Arc::new(
        Cache::<u64>::builder(1_000_000)
            .channel_buffer_size(8)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    let key = format!("k{}", (t * 31 + i) % 200);
                    match i % 4 {
                        0 => {
                            cache.remove(&key);
                        }
                        1 => {
                            cache.get(&key);
                        }
                        _ => {
                            cache.set(key, i);
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_ok!(cache.run_pending_tasks());

    let live = (0..200)
        .filter(|i| cache.get(&format!("k{}", i)).is_some())
        .count();
    assert_eq!(cache.size(), live);
    assert_eq!(cache.total_weight(), live as u64);
}

#[test]
fn test_concurrent_eviction_respects_bound() {
    init_tracing();
    let evictions = Arc::new(Mutex::new(HashMap::<String, u32>::new()));
    let sink = evictions.clone();
    let cache: Arc<Cache<u64>> = Arc::new(
        Cache::<u64>::builder(50)
            .shards(4)
            .on_evict(move |key, _| {
                *sink.lock().unwrap().entry(key.to_string()).or_default() += 1;
            })
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..250u64 {
                    cache.set(format!("t{}-{}", t, i), i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_ok!(cache.run_pending_tasks());

    assert!(cache.total_weight() <= 50);
    assert_eq!(cache.size(), 50);
    let evictions = evictions.lock().unwrap();
    assert_eq!(evictions.len(), 1000 - 50);
    assert!(evictions.values().all(|count| *count == 1));
}

#[test]
fn test_drop_drains_and_stops_workers() {
    let (_, evicted, cache) = cache_with_evictions(1);
    cache.set("a", "a".to_string());
    cache.set("b", "b".to_string());
    cache.shutdown();

    assert_eq!(
        *evicted.lock().unwrap(),
        vec![("a".to_string(), "a".to_string())]
    );
}
