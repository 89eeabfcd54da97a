//! JSON-RPC over WebSocket, with subscriptions.
//!
//! A thin [`RpcEngine`] adapter over `jsonrpsee`'s [`WsClient`]. The client
//! owns the connection, matches responses to requests and routes
//! notifications; dropping a [`Subscription`] unsubscribes.

use std::fmt;

use futures::StreamExt;
use futures::future::BoxFuture;
use jsonrpsee::core::client::{ClientT, Error as ClientError, SubscriptionClientT, SubscriptionKind};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::types::SubscriptionId;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};

use super::rpc::{RpcEngine, Subscription};
use crate::error::RpcError;

/// JSON-RPC client over a WebSocket connection.
///
/// Cheap to share behind an `Arc`; all calls go through one connection. When
/// the connection drops, later requests fail with [`RpcError::Connection`]
/// and open subscriptions end.
pub struct WsRpcClient {
    url: String,
    client: WsClient,
}

impl WsRpcClient {
    /// Connect to `url` (`ws://` or `wss://`).
    pub async fn connect(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        let client = WsClientBuilder::default()
            .build(&url)
            .await
            .map_err(|e| RpcError::Connection(format!("{}: {}", url, e)))?;
        tracing::debug!(%url, "websocket connected");
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        self.client
            .request(method, array_params(params)?)
            .await
            .map_err(client_error)
    }

    async fn open_subscription(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
        unsubscribe_method: &str,
    ) -> Result<Subscription, RpcError> {
        let subscription: jsonrpsee::core::client::Subscription<serde_json::Value> = self
            .client
            .subscribe(method, array_params(params)?, unsubscribe_method)
            .await
            .map_err(client_error)?;

        let id = match subscription.kind() {
            SubscriptionKind::Subscription(SubscriptionId::Str(s)) => s.to_string(),
            SubscriptionKind::Subscription(SubscriptionId::Num(n)) => n.to_string(),
            SubscriptionKind::Method(m) => m.clone(),
            // `SubscriptionKind` is `#[non_exhaustive]`; no other variants exist in jsonrpsee 0.24.
            other => format!("{:?}", other),
        };
        tracing::trace!(method, subscription = %id, "subscribed");

        let stream = subscription
            .map(|item| item.map_err(RpcError::Json))
            .boxed();
        Ok(Subscription::new(id, stream))
    }
}

fn array_params(params: Vec<serde_json::Value>) -> Result<ArrayParams, RpcError> {
    let mut array = ArrayParams::new();
    for param in params {
        array.insert(param)?;
    }
    Ok(array)
}

/// Map a `jsonrpsee` failure onto the transport-neutral [`RpcError`].
fn client_error(err: ClientError) -> RpcError {
    match err {
        ClientError::Call(obj) => {
            let data = obj
                .data()
                .and_then(|raw| serde_json::from_str(raw.get()).ok());
            RpcError::from_payload(obj.code() as i64, obj.message().to_string(), data)
        }
        ClientError::ParseError(e) => RpcError::Json(e),
        ClientError::RequestTimeout => RpcError::Connection("request timed out".to_string()),
        ClientError::RestartNeeded(reason) => {
            RpcError::Connection(format!("websocket closed: {}", reason))
        }
        ClientError::Transport(e) => RpcError::Connection(e.to_string()),
        other => RpcError::InvalidResponse(other.to_string()),
    }
}

impl RpcEngine for WsRpcClient {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value, RpcError>> {
        Box::pin(self.call(method, params))
    }

    fn subscribe<'a>(
        &'a self,
        method: &'a str,
        params: Vec<serde_json::Value>,
        unsubscribe_method: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, RpcError>> {
        Box::pin(self.open_subscription(method, params, unsubscribe_method))
    }
}

impl fmt::Debug for WsRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsRpcClient")
            .field("url", &self.url)
            .field("connected", &self.client.is_connected())
            .finish()
    }
}
