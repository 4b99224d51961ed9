//! The shard handle the executor dispatches against. Production code backs
//! this with a `reqwest`-based HTTP client; tests substitute an in-process
//! fake, the same way `gazette::shard::Client` is a thin wrapper around a
//! routed transport that tests can swap out.

use serde_json::Value;

/// A request to a single shard's HTTP-like endpoint.
#[derive(Debug, Clone)]
pub struct ShardRequest {
    /// Path and query string, e.g. `/lookup?ids=a%2Cb`.
    pub path_and_query: String,
}

/// The raw (pre-validation) response from a shard: an HTTP status and a
/// decoded JSON body. Non-2xx statuses are represented here, not as an
/// error — only connection-level failures are [`TransportError`].
#[derive(Debug, Clone)]
pub struct RawShardResponse {
    pub status: u16,
    pub body: Value,
}

/// A failure to even complete the HTTP exchange: connection refused, DNS
/// failure, timeout at the transport layer, etc. The message is matched
/// against the transient-error pattern in §4.4.
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

/// A handle to one shard (or shard replica). Implementations dispatch a
/// constructed request path and report back the raw status/body.
#[async_trait::async_trait]
pub trait ShardStub: Send + Sync {
    async fn dispatch(&self, request: &ShardRequest) -> Result<RawShardResponse, TransportError>;
}

/// Production [`ShardStub`] backed by `reqwest`, talking to a shard's HTTP
/// origin.
pub struct HttpShardStub {
    client: reqwest::Client,
    origin: String,
}

impl HttpShardStub {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, origin: impl Into<String>) -> Self {
        Self {
            client,
            origin: origin.into(),
        }
    }
}

#[async_trait::async_trait]
impl ShardStub for HttpShardStub {
    async fn dispatch(&self, request: &ShardRequest) -> Result<RawShardResponse, TransportError> {
        let url = format!("{}{}", self.origin, request.path_and_query);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(RawShardResponse { status, body })
    }
}
