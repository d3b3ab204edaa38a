use super::*;
use chrono::TimeZone;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Mutex;

const TTL: Duration = Duration::from_secs(60);

/// A clock the test can move by hand.
fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
    let now = Arc::new(Mutex::new(start));
    let handle = Arc::clone(&now);
    let clock: Clock = Arc::new(move || *handle.lock().unwrap());
    (clock, now)
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn advance(now: &Arc<Mutex<DateTime<Utc>>>, secs: i64) {
    let mut guard = now.lock().unwrap();
    *guard += chrono::Duration::seconds(secs);
}

#[test]
fn test_fresh_then_stale() {
    let (clock, now) = manual_clock(start());
    let mut cache = PersistentCache::new(MemoryStore::new(), "test:", TTL).with_clock(clock);

    assert!(cache.get("/a").is_none());
    cache.set("/a", &json!({"v": 1}));

    let hit = cache.get("/a").unwrap();
    assert_eq!(hit.payload, json!({"v": 1}));
    assert!(!hit.is_stale);
    assert_eq!(hit.written_at, start());

    // Exactly at the TTL the entry is still fresh
    advance(&now, 60);
    assert!(!cache.get("/a").unwrap().is_stale);

    advance(&now, 1);
    let hit = cache.get("/a").unwrap();
    assert!(hit.is_stale);
    assert_eq!(hit.age, Duration::from_secs(61));
}

#[test]
fn test_entry_format_is_data_and_timestamp() {
    let (clock, _) = manual_clock(start());
    let mut cache = PersistentCache::new(MemoryStore::new(), "ns:", TTL).with_clock(clock);
    cache.set("/users/octo/repos", &json!([1, 2]));

    let raw = cache.store().read("ns:/users/octo/repos").unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        stored,
        json!({"data": [1, 2], "timestamp": start().timestamp_millis()})
    );
}

#[test]
fn test_corrupt_entry_is_a_miss() {
    let mut store = MemoryStore::new();
    store.write("test:/broken", "{not json").unwrap();
    store.write("test:/wrong-shape", "[1,2,3]").unwrap();
    let cache = PersistentCache::new(store, "test:", TTL);

    assert!(cache.get("/broken").is_none());
    assert!(cache.get("/wrong-shape").is_none());
}

#[test]
fn test_evict_older_than() {
    let (clock, now) = manual_clock(start());
    let mut cache = PersistentCache::new(MemoryStore::new(), "test:", TTL).with_clock(clock);

    cache.set("/old", &json!(1));
    advance(&now, 600);
    cache.set("/new", &json!(2));
    advance(&now, 10);

    let removed = cache.evict_older_than(Duration::from_secs(300));
    assert_eq!(removed, 1);
    assert!(cache.get("/old").is_none());
    assert!(cache.get("/new").is_some());
}

#[test]
fn test_prune_uses_six_ttl_periods() {
    let (clock, now) = manual_clock(start());
    let mut cache = PersistentCache::new(MemoryStore::new(), "test:", TTL).with_clock(clock);
    cache.set("/a", &json!(1));

    advance(&now, 6 * 60);
    assert_eq!(cache.prune(), 0);
    advance(&now, 1);
    assert_eq!(cache.prune(), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_full_store_evicts_and_retries() {
    let (clock, now) = manual_clock(start());
    let mut cache =
        PersistentCache::new(MemoryStore::with_quota(120), "test:", TTL).with_clock(clock);

    cache.set("/old", &json!("x".repeat(40)));
    advance(&now, 7 * 60);

    // Does not fit next to /old, but /old is past six TTL periods
    cache.set("/new", &json!("y".repeat(40)));
    assert!(cache.get("/old").is_none());
    assert_eq!(cache.get("/new").unwrap().payload, json!("y".repeat(40)));
}

#[test]
fn test_second_full_failure_is_dropped() {
    let (clock, _) = manual_clock(start());
    let mut cache =
        PersistentCache::new(MemoryStore::with_quota(120), "test:", TTL).with_clock(clock);

    cache.set("/recent", &json!("x".repeat(40)));
    // Nothing is old enough to evict, so the write is silently dropped
    cache.set("/new", &json!("y".repeat(40)));
    assert!(cache.get("/new").is_none());
    assert!(cache.get("/recent").is_some());

    assert!(cache.try_set("/new", &json!("y".repeat(40))).unwrap_err().is_full());
}

#[test]
fn test_clear_only_touches_namespace() {
    let mut store = MemoryStore::new();
    store.write("other:/keep", "{}").unwrap();
    let mut cache = PersistentCache::new(store, "test:", TTL);
    cache.set("/a", &json!(1));
    cache.set("/b", &json!(2));

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.clear(), 2);
    assert!(cache.is_empty());
    assert!(cache.store().read("other:/keep").unwrap().is_some());
}

#[test]
fn test_file_backed_cache_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let mut cache = PersistentCache::new(FileStore::new(dir.path()), "test:", TTL);
        cache.set("/repos/octo/hello/stats/contributors", &json!([{"total": 3}]));
    }
    let cache = PersistentCache::new(FileStore::new(dir.path()), "test:", TTL);
    let hit = cache.get("/repos/octo/hello/stats/contributors").unwrap();
    assert_eq!(hit.payload, json!([{"total": 3}]));
    assert!(!hit.is_stale);
}
