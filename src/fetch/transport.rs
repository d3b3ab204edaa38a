//! The "GET a JSON endpoint" capability the fetcher is built on.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT};
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::error::FetchError;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Status, quota headers and decoded body of one upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Value of `x-ratelimit-remaining`, when present
    pub rate_limit_remaining: Option<u64>,
    /// Value of `x-ratelimit-reset` in Unix seconds, when present
    pub rate_limit_reset: Option<i64>,
    /// `Value::Null` for empty bodies
    pub body: Value,
}

impl TransportResponse {
    /// A 200 response carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            rate_limit_remaining: None,
            rate_limit_reset: None,
            body,
        }
    }

    /// An empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            rate_limit_remaining: None,
            rate_limit_reset: None,
            body: Value::Null,
        }
    }

    /// A 403 with the quota exhausted, resetting at `reset` (Unix seconds).
    pub fn rate_limited(reset: Option<i64>) -> Self {
        Self {
            status: 403,
            rate_limit_remaining: Some(0),
            rate_limit_reset: reset,
            body: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_quota_exhausted(&self) -> bool {
        self.status == 403 && self.rate_limit_remaining == Some(0)
    }
}

/// Performs a single GET against a path relative to the upstream API root.
#[async_trait]
pub trait JsonTransport: Send + Sync + 'static {
    async fn get_json(&self, endpoint: &str) -> Result<TransportResponse, FetchError>;
}

/// [`JsonTransport`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Decode a response body. Blank bodies (202s, 204s) are `Null`, and so are
/// non-JSON error pages; only a success body must be valid JSON.
fn decode_body(endpoint: &str, status: u16, bytes: &[u8]) -> Result<Value, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(body) => Ok(body),
        Err(_) if !(200..300).contains(&status) => Ok(Value::Null),
        Err(e) => Err(FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: format!("invalid JSON body: {}", e),
        }),
    }
}

fn header_number<N: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<N> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn get_json(&self, endpoint: &str) -> Result<TransportResponse, FetchError> {
        let transport_err = |e: reqwest::Error| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        };

        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status().as_u16();
        let rate_limit_remaining = header_number(response.headers(), RATE_LIMIT_REMAINING);
        let rate_limit_reset = header_number(response.headers(), RATE_LIMIT_RESET);
        let bytes = response.bytes().await.map_err(transport_err)?;

        let body = decode_body(endpoint, status, &bytes)?;

        Ok(TransportResponse {
            status,
            rate_limit_remaining,
            rate_limit_reset,
            body,
        })
    }
}
