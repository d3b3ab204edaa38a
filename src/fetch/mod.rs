//! Cache-first, rate-limit aware JSON fetching.
//!
//! [`ResilientFetcher::fetch`] prefers returning some data over failing:
//! while the quota latch is set it answers from cache only, a stale entry is
//! served immediately while a background task refreshes it, and network
//! failures fall back to whatever is cached. `None` is only returned when a
//! request fails and nothing was ever cached for that endpoint.

mod mock;
mod rate_limit;
#[cfg(test)]
mod tests;
mod transport;

pub use mock::MockTransport;
pub use rate_limit::{RateLimitLatch, MAX_RATE_LIMIT_WAIT};
pub use transport::{HttpTransport, JsonTransport, TransportResponse};

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::cache::{CacheStore, PersistentCache};
use crate::error::FetchError;

const REFRESH_EVENT_BUFFER: usize = 32;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Retry policy for statistics that are still being computed upstream.
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Extra attempts after a `202 Accepted`
    pub pending_retries: u32,
    pub pending_retry_delay: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            pending_retries: 2,
            pending_retry_delay: Duration::from_millis(1500),
        }
    }
}

/// How a background refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed(FetchError),
}

/// Reported once per finished background refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    pub endpoint: String,
    pub outcome: RefreshOutcome,
}

/// State shared between foreground fetches and background refresh tasks.
struct Shared<T: JsonTransport, S: CacheStore> {
    transport: T,
    cache: Mutex<PersistentCache<S>>,
    latch: RateLimitLatch,
    options: FetcherOptions,
    in_flight: Mutex<HashSet<String>>,
    /// One permit: foreground fetches and background refreshes take turns upstream
    upstream: Semaphore,
    events: mpsc::Sender<RefreshEvent>,
}

impl<T: JsonTransport, S: CacheStore> Shared<T, S> {
    fn cache(&self) -> MutexGuard<'_, PersistentCache<S>> {
        lock(&self.cache)
    }

    /// One network round, retrying 202s. Successful payloads are cached.
    ///
    /// Rounds never overlap, whichever task starts them.
    async fn fetch_network(&self, endpoint: &str) -> Result<Value, FetchError> {
        let _permit = self.upstream.acquire().await.map_err(|_| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: "fetcher shut down".to_string(),
        })?;
        let mut attempt = 0;
        loop {
            let response = self.transport.get_json(endpoint).await?;

            if response.status == 202 {
                self.latch.clear();
                if attempt < self.options.pending_retries {
                    attempt += 1;
                    debug!(endpoint, attempt, "statistics pending, retrying");
                    tokio::time::sleep(self.options.pending_retry_delay).await;
                    continue;
                }
                return Err(FetchError::Pending {
                    endpoint: endpoint.to_string(),
                });
            }

            if response.is_success() {
                self.latch.clear();
                self.cache().set(endpoint, &response.body);
                return Ok(response.body);
            }

            if response.is_quota_exhausted() {
                let reset_at = response
                    .rate_limit_reset
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
                self.latch.trip(reset_at, Utc::now());
                return Err(FetchError::RateLimited { reset_at });
            }

            return Err(FetchError::Network {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }
    }
}

/// Wraps a [`JsonTransport`] with a [`PersistentCache`] and a rate-limit latch.
pub struct ResilientFetcher<T: JsonTransport, S: CacheStore> {
    shared: Arc<Shared<T, S>>,
    tracker: TaskTracker,
    events: Mutex<Option<mpsc::Receiver<RefreshEvent>>>,
}

impl<T: JsonTransport, S: CacheStore> ResilientFetcher<T, S> {
    pub fn new(transport: T, cache: PersistentCache<S>) -> Self {
        Self::with_options(transport, cache, FetcherOptions::default())
    }

    pub fn with_options(transport: T, cache: PersistentCache<S>, options: FetcherOptions) -> Self {
        let (tx, rx) = mpsc::channel(REFRESH_EVENT_BUFFER);
        Self {
            shared: Arc::new(Shared {
                transport,
                cache: Mutex::new(cache),
                latch: RateLimitLatch::new(),
                options,
                in_flight: Mutex::new(HashSet::new()),
                upstream: Semaphore::new(1),
                events: tx,
            }),
            tracker: TaskTracker::new(),
            events: Mutex::new(Some(rx)),
        }
    }

    /// Fetch `endpoint`, degrading to cached data on any failure.
    ///
    /// Order of preference:
    /// 1. latch set and an entry cached: the entry, no network
    /// 2. fresh entry and no `force_refresh`: the entry
    /// 3. stale entry: the entry now, refreshed in the background
    /// 4. the network; on failure the cached entry, if any
    pub async fn fetch(&self, endpoint: &str, force_refresh: bool) -> Option<Value> {
        let cached = self.shared.cache().get(endpoint);

        if let Some(hit) = &cached {
            if self.shared.latch.is_set() {
                debug!(endpoint, "rate limited, serving cache");
                return Some(hit.payload.clone());
            }
            if !hit.is_stale && !force_refresh {
                debug!(endpoint, "fresh cache hit");
                return Some(hit.payload.clone());
            }
            if hit.is_stale {
                debug!(endpoint, age_secs = hit.age.as_secs(), "stale cache hit, revalidating");
                self.spawn_refresh(endpoint);
                return Some(hit.payload.clone());
            }
        }

        match self.shared.fetch_network(endpoint).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(endpoint, error = %e, cached = cached.is_some(), "fetch failed");
                cached.map(|hit| hit.payload)
            }
        }
    }

    /// Refresh `endpoint` on a detached task unless one is already running.
    fn spawn_refresh(&self, endpoint: &str) {
        if !lock(&self.shared.in_flight).insert(endpoint.to_string()) {
            debug!(endpoint, "refresh already in flight");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let endpoint = endpoint.to_string();
        self.tracker.spawn(async move {
            let outcome = match shared.fetch_network(&endpoint).await {
                Ok(_) => {
                    debug!(endpoint = %endpoint, "background refresh stored");
                    RefreshOutcome::Refreshed
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "background refresh failed");
                    RefreshOutcome::Failed(e)
                }
            };
            lock(&shared.in_flight).remove(&endpoint);
            if shared
                .events
                .try_send(RefreshEvent { endpoint, outcome })
                .is_err()
            {
                debug!("refresh event dropped, no listener keeping up");
            }
        });
    }

    /// Receiver for background refresh outcomes. Can be taken once.
    pub fn take_refresh_events(&self) -> Option<mpsc::Receiver<RefreshEvent>> {
        lock(&self.events).take()
    }

    /// Wait for every background refresh started so far.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn is_rate_limited(&self) -> bool {
        self.shared.latch.is_set()
    }

    pub fn rate_limit(&self) -> &RateLimitLatch {
        &self.shared.latch
    }

    /// Run `f` with exclusive access to the cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut PersistentCache<S>) -> R) -> R {
        f(&mut self.shared.cache())
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}
