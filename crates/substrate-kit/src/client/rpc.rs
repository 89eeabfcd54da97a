//! JSON-RPC transport: the [`RpcEngine`] trait and its HTTP implementation.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::RpcError;

/// A JSON-RPC transport.
///
/// Both methods take positional parameters. Implementations must be safe to
/// share between concurrent requests.
pub trait RpcEngine: Send + Sync {
    /// Call `method` and return its raw JSON result.
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value, RpcError>>;

    /// Open a subscription with `method`. Dropping the returned
    /// [`Subscription`] calls `unsubscribe_method` on the node.
    fn subscribe<'a>(
        &'a self,
        method: &'a str,
        params: Vec<serde_json::Value>,
        unsubscribe_method: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, RpcError>>;
}

/// Call `method` and deserialize the result.
pub async fn request_as<R: DeserializeOwned>(
    engine: &dyn RpcEngine,
    method: &str,
    params: Vec<serde_json::Value>,
) -> Result<R, RpcError> {
    let value = engine.request(method, params).await?;
    tracing::trace!(method, result = %value, "rpc result");
    serde_json::from_value(value).map_err(RpcError::Json)
}

// ============================================================================
// Subscription
// ============================================================================

/// A stream of notifications from a node subscription.
pub struct Subscription {
    id: String,
    stream: BoxStream<'static, Result<serde_json::Value, RpcError>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a notification stream.
    pub fn new(
        id: impl Into<String>,
        stream: BoxStream<'static, Result<serde_json::Value, RpcError>>,
    ) -> Self {
        Self {
            id: id.into(),
            stream,
            on_drop: None,
        }
    }

    /// Run `f` when the subscription is dropped.
    pub fn on_drop(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_drop = Some(Box::new(f));
        self
    }

    /// The node-assigned subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for Subscription {
    type Item = Result<serde_json::Value, RpcError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Wire structures
// ============================================================================

/// Retry configuration for transport-level retries.
///
/// Retries are off by default: the transaction pipeline surfaces transport
/// failures to the caller unchanged.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

/// JSON-RPC request structure.
#[derive(Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

/// JSON-RPC response structure.
#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn into_rpc_error(self) -> RpcError {
        RpcError::from_payload(self.code, self.message, self.data)
    }
}

impl JsonRpcResponse {
    /// The result, or the node's error.
    ///
    /// A `null` result is valid for several Substrate methods (e.g. a header
    /// for an unknown hash), so a missing `result` only fails when there is
    /// also no `error`.
    fn into_result(self) -> Result<serde_json::Value, RpcError> {
        if let Some(error) = self.error {
            return Err(error.into_rpc_error());
        }
        Ok(self.result.unwrap_or(serde_json::Value::Null))
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// JSON-RPC client over HTTP.
///
/// HTTP cannot carry subscriptions; use [`WsRpcClient`](super::WsRpcClient)
/// for submit-and-watch.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_retry_config(url, RetryConfig::default())
    }

    /// Create a new RPC client with custom retry configuration.
    pub fn with_retry_config(url: impl Into<String>, retry_config: RetryConfig) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            retry_config,
            request_id: AtomicU64::new(0),
        }
    }

    /// Get the RPC URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a typed RPC call, retrying per the retry configuration.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<R, RpcError> {
        let value = self.call_raw(method, params).await?;
        serde_json::from_value(value).map_err(RpcError::Json)
    }

    async fn call_raw(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let total_attempts = self.retry_config.max_retries + 1;
        let mut attempt = 0;

        loop {
            let request = JsonRpcRequest {
                jsonrpc: "2.0",
                id: self.request_id.fetch_add(1, Ordering::Relaxed),
                method,
                params: &params,
            };

            match self.try_call(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt + 1 < total_attempts => {
                    let delay = std::cmp::min(
                        self.retry_config.initial_delay_ms * 2u64.pow(attempt),
                        self.retry_config.max_delay_ms,
                    );
                    tracing::debug!(method, attempt, delay_ms = delay, error = %e, "retrying rpc call");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single attempt to make an RPC call.
    async fn try_call(
        &self,
        request: &JsonRpcRequest<'_, impl Serialize>,
    ) -> Result<serde_json::Value, RpcError> {
        tracing::trace!(method = request.method, id = request.id, "rpc request");
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let retryable = is_retryable_status(status.as_u16());
            return Err(RpcError::network(
                format!("HTTP {}: {}", status, body),
                Some(status.as_u16()),
                retryable,
            ));
        }

        let rpc_response: JsonRpcResponse = serde_json::from_str(&body).map_err(RpcError::Json)?;
        rpc_response.into_result()
    }
}

impl RpcEngine for RpcClient {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value, RpcError>> {
        Box::pin(self.call_raw(method, params))
    }

    fn subscribe<'a>(
        &'a self,
        _method: &'a str,
        _params: Vec<serde_json::Value>,
        _unsubscribe_method: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, RpcError>> {
        Box::pin(async { Err(RpcError::SubscriptionsUnsupported) })
    }
}

impl Clone for RpcClient {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            client: self.client.clone(),
            retry_config: self.retry_config.clone(),
            request_id: AtomicU64::new(0),
        }
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Check if an HTTP status code is retryable.
fn is_retryable_status(status: u16) -> bool {
    // 408 Request Timeout - retryable
    // 429 Too Many Requests - retryable (rate limiting)
    // 5xx Server Errors - retryable
    status == 408 || status == 429 || (500..600).contains(&status)
}
