//! Scripted in-memory transport for tests and offline demos.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::transport::{JsonTransport, TransportResponse};
use crate::error::FetchError;

type Scripted = Result<TransportResponse, FetchError>;

#[derive(Default)]
struct MockState {
    routes: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<String>,
}

/// Serves queued responses per endpoint.
///
/// Responses for an endpoint are consumed in order; the last one keeps being
/// served once the queue is down to it. Unknown endpoints answer 404. Clones
/// share the same script and call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a response for `endpoint`.
    pub fn respond(&self, endpoint: &str, response: TransportResponse) -> &Self {
        self.push(endpoint, Ok(response))
    }

    /// Queue a 200 carrying `body` for `endpoint`.
    pub fn respond_json(&self, endpoint: &str, body: Value) -> &Self {
        self.respond(endpoint, TransportResponse::ok(body))
    }

    /// Queue a transport-level failure for `endpoint`.
    pub fn fail(&self, endpoint: &str) -> &Self {
        let error = FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: "connection refused".to_string(),
        };
        self.push(endpoint, Err(error))
    }

    /// Drop every queued response for `endpoint` and queue `response` instead.
    pub fn replace(&self, endpoint: &str, response: TransportResponse) -> &Self {
        self.state().routes.remove(endpoint);
        self.respond(endpoint, response)
    }

    fn push(&self, endpoint: &str, scripted: Scripted) -> &Self {
        self.state()
            .routes
            .entry(endpoint.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    /// Every endpoint requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == endpoint).count()
    }
}

#[async_trait]
impl JsonTransport for MockTransport {
    async fn get_json(&self, endpoint: &str) -> Result<TransportResponse, FetchError> {
        let mut state = self.state();
        state.calls.push(endpoint.to_string());
        let scripted = match state.routes.get_mut(endpoint) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        scripted.unwrap_or_else(|| Ok(TransportResponse::status(404)))
    }
}
