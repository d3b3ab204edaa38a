use super::*;
use crate::cache::MemoryStore;
use pretty_assertions::assert_eq;
use serde_json::json;

const TTL: Duration = Duration::from_secs(300);
const REPOS: &str = "/users/octo/repos";

fn fetcher_with(
    transport: &MockTransport,
    store: MemoryStore,
) -> ResilientFetcher<MockTransport, MemoryStore> {
    let cache = PersistentCache::new(store, "test:", TTL);
    let options = FetcherOptions {
        pending_retries: 2,
        pending_retry_delay: Duration::from_millis(10),
    };
    ResilientFetcher::with_options(transport.clone(), cache, options)
}

/// Store holding `payload` for `endpoint`, written `age_secs` ago.
fn store_with_entry(endpoint: &str, payload: Value, age_secs: i64) -> MemoryStore {
    let written = Utc::now() - chrono::Duration::seconds(age_secs);
    let raw = json!({"data": payload, "timestamp": written.timestamp_millis()});
    let mut store = MemoryStore::new();
    store
        .write(&format!("test:{}", endpoint), &raw.to_string())
        .unwrap();
    store
}

#[tokio::test]
async fn test_miss_fetches_and_caches() {
    let transport = MockTransport::new();
    transport.respond_json(REPOS, json!([{"name": "hello"}]));
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!([{"name": "hello"}])));
    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!([{"name": "hello"}])));
    assert_eq!(transport.call_count(REPOS), 1);
    assert!(fetcher.with_cache(|cache| cache.get(REPOS)).is_some());
}

#[tokio::test]
async fn test_fresh_hit_skips_network() {
    let transport = MockTransport::new();
    let fetcher = fetcher_with(&transport, store_with_entry(REPOS, json!(["cached"]), 10));

    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!(["cached"])));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_cacheless_failure_is_none() {
    let transport = MockTransport::new();
    transport.fail(REPOS);
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(REPOS, false).await, None);

    transport.replace(REPOS, TransportResponse::status(500));
    assert_eq!(fetcher.fetch(REPOS, false).await, None);
}

#[tokio::test]
async fn test_stale_entry_survives_failing_network() {
    let transport = MockTransport::new();
    transport.respond(REPOS, TransportResponse::status(500));
    let fetcher = fetcher_with(&transport, store_with_entry(REPOS, json!(["old"]), 3600));
    let mut events = fetcher.take_refresh_events().unwrap();

    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!(["old"])));
    fetcher.settle().await;

    let event = events.recv().await.unwrap();
    assert_eq!(event.endpoint, REPOS);
    assert_eq!(
        event.outcome,
        RefreshOutcome::Failed(FetchError::Network {
            endpoint: REPOS.to_string(),
            status: 500
        })
    );
    // The failed refresh leaves the stale payload in place
    let hit = fetcher.with_cache(|cache| cache.get(REPOS)).unwrap();
    assert_eq!(hit.payload, json!(["old"]));
    assert!(hit.is_stale);
}

#[tokio::test]
async fn test_stale_entry_refreshed_in_background() {
    let transport = MockTransport::new();
    transport.respond_json(REPOS, json!(["new"]));
    let fetcher = fetcher_with(&transport, store_with_entry(REPOS, json!(["old"]), 3600));
    let mut events = fetcher.take_refresh_events().unwrap();

    // Served immediately from cache
    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!(["old"])));
    fetcher.settle().await;

    assert_eq!(events.recv().await.unwrap().outcome, RefreshOutcome::Refreshed);
    let hit = fetcher.with_cache(|cache| cache.get(REPOS)).unwrap();
    assert_eq!(hit.payload, json!(["new"]));
    assert!(!hit.is_stale);
    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!(["new"])));
    assert_eq!(transport.call_count(REPOS), 1);
}

#[tokio::test]
async fn test_refresh_events_can_only_be_taken_once() {
    let fetcher = fetcher_with(&MockTransport::new(), MemoryStore::new());
    assert!(fetcher.take_refresh_events().is_some());
    assert!(fetcher.take_refresh_events().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_quota_exhaustion_sets_latch_and_serves_cache() {
    let stats = "/repos/octo/hello/stats/contributors";
    let transport = MockTransport::new();
    let reset = Utc::now().timestamp() + 600;
    transport.respond(REPOS, TransportResponse::rate_limited(Some(reset)));
    let fetcher = fetcher_with(&transport, store_with_entry(stats, json!(["cached"]), 3600));

    // Nothing cached for the repo list: the first failure is the only None
    assert_eq!(fetcher.fetch(REPOS, false).await, None);
    assert!(fetcher.is_rate_limited());
    assert_eq!(
        fetcher.rate_limit().reset_at(),
        DateTime::<Utc>::from_timestamp(reset, 0)
    );

    // Stale entry served without a network attempt or background refresh
    assert_eq!(fetcher.fetch(stats, false).await, Some(json!(["cached"])));
    fetcher.settle().await;
    assert_eq!(transport.call_count(stats), 0);

    tokio::time::advance(Duration::from_secs(601)).await;
    assert!(!fetcher.is_rate_limited());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_cleared_by_success() {
    let transport = MockTransport::new();
    transport.respond(REPOS, TransportResponse::rate_limited(None));
    transport.respond_json(REPOS, json!([]));
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(REPOS, false).await, None);
    assert!(fetcher.is_rate_limited());
    assert_eq!(fetcher.fetch(REPOS, false).await, Some(json!([])));
    assert!(!fetcher.is_rate_limited());
}

#[tokio::test]
async fn test_forbidden_with_quota_left_is_network_error() {
    let transport = MockTransport::new();
    let mut forbidden = TransportResponse::status(403);
    forbidden.rate_limit_remaining = Some(42);
    transport.respond(REPOS, forbidden);
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(REPOS, false).await, None);
    assert!(!fetcher.is_rate_limited());
}

#[tokio::test(start_paused = true)]
async fn test_pending_stats_are_retried() {
    let stats = "/repos/octo/hello/stats/contributors";
    let transport = MockTransport::new();
    transport.respond(stats, TransportResponse::status(202));
    transport.respond_json(stats, json!([{"total": 1}]));
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(stats, false).await, Some(json!([{"total": 1}])));
    assert_eq!(transport.call_count(stats), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_stats_are_never_cached() {
    let stats = "/repos/octo/hello/stats/contributors";
    let transport = MockTransport::new();
    transport.respond(stats, TransportResponse::status(202));
    let fetcher = fetcher_with(&transport, MemoryStore::new());

    assert_eq!(fetcher.fetch(stats, false).await, None);
    // One attempt plus two retries
    assert_eq!(transport.call_count(stats), 3);
    assert!(fetcher.with_cache(|cache| cache.is_empty()));
}

#[tokio::test]
async fn test_force_refresh_bypasses_fresh_entry() {
    let transport = MockTransport::new();
    transport.respond_json(REPOS, json!(["forced"]));
    transport.fail(REPOS);
    let fetcher = fetcher_with(&transport, store_with_entry(REPOS, json!(["cached"]), 10));

    assert_eq!(fetcher.fetch(REPOS, true).await, Some(json!(["forced"])));
    // Forced fetch that fails falls back to the cached entry
    assert_eq!(fetcher.fetch(REPOS, true).await, Some(json!(["forced"])));
    assert_eq!(transport.call_count(REPOS), 2);
}

/// Answers every endpoint after a delay and records how many requests overlap.
#[derive(Default)]
struct SlowTransport {
    in_flight: std::sync::atomic::AtomicUsize,
    peak: std::sync::atomic::AtomicUsize,
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl JsonTransport for SlowTransport {
    async fn get_json(&self, endpoint: &str) -> Result<TransportResponse, FetchError> {
        use std::sync::atomic::Ordering::SeqCst;
        let now = self.in_flight.fetch_add(1, SeqCst) + 1;
        self.peak.fetch_max(now, SeqCst);
        self.calls.fetch_add(1, SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, SeqCst);
        Ok(TransportResponse::ok(json!({"endpoint": endpoint})))
    }
}

#[tokio::test(start_paused = true)]
async fn test_upstream_requests_never_overlap() {
    use std::sync::atomic::Ordering::SeqCst;

    let written = Utc::now() - chrono::Duration::seconds(3600);
    let mut store = MemoryStore::new();
    let endpoints: Vec<String> = (0..10)
        .map(|i| format!("/repos/octo/repo-{}/stats/contributors", i))
        .collect();
    for endpoint in &endpoints {
        let raw = json!({"data": "old", "timestamp": written.timestamp_millis()});
        store
            .write(&format!("test:{}", endpoint), &raw.to_string())
            .unwrap();
    }
    let cache = PersistentCache::new(store, "test:", TTL);
    let fetcher = ResilientFetcher::new(SlowTransport::default(), cache);

    for endpoint in &endpoints {
        assert_eq!(fetcher.fetch(endpoint, false).await, Some(json!("old")));
    }
    // A cache miss shares the single upstream slot with the refreshes
    assert_eq!(
        fetcher.fetch(REPOS, false).await,
        Some(json!({"endpoint": REPOS}))
    );
    fetcher.settle().await;

    let transport = fetcher.transport();
    assert_eq!(transport.calls.load(SeqCst), 11);
    assert_eq!(transport.peak.load(SeqCst), 1);
    let refreshed = fetcher.with_cache(|cache| cache.get(&endpoints[9])).unwrap();
    assert!(!refreshed.is_stale);
}
