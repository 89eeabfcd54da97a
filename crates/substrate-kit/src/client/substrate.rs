//! The main client.

use std::sync::Arc;

use super::rpc::{RetryConfig, RpcClient, RpcEngine, request_as};
use super::service::{ExtrinsicRequest, ServiceConfig, TransactionService};
use super::signer::{EnvSigner, InMemorySigner, Signer};
use super::ws::WsRpcClient;
use crate::codec::Value;
use crate::error::{Error, RpcError};
use crate::extrinsic::{ExtensionKind, ExtensionResolver, UnknownExtensionPolicy};
use crate::metadata::{RpcRuntimeProvider, RuntimeMetadata, RuntimeProvider};
use crate::types::{AccountId, Call, H256, Header, Network, RuntimeVersion};

/// The main client for a Substrate chain.
///
/// Holds the transport, the optional default signer and the transaction
/// pipeline. Cheap to clone.
///
/// # Example
///
/// ```rust,no_run
/// use substrate_kit::*;
///
/// # async fn example(dest: AccountId) -> Result<(), Error> {
/// let client = Substrate::westend()
///     .credentials("sr25519:0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a")?
///     .build();
///
/// let hash = client.transfer(dest, 1_000_000_000_000).await?;
/// println!("submitted {}", hash);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Substrate {
    rpc: Arc<dyn RpcEngine>,
    service: Arc<TransactionService>,
    signer: Option<Arc<dyn Signer>>,
    network: Network,
}

impl Substrate {
    /// Create a builder for Polkadot.
    pub fn polkadot() -> SubstrateBuilder {
        SubstrateBuilder::for_network(Network::Polkadot)
    }

    /// Create a builder for Kusama.
    pub fn kusama() -> SubstrateBuilder {
        SubstrateBuilder::for_network(Network::Kusama)
    }

    /// Create a builder for Westend.
    pub fn westend() -> SubstrateBuilder {
        SubstrateBuilder::for_network(Network::Westend)
    }

    /// Create a builder with a custom RPC URL.
    pub fn custom(rpc_url: impl Into<String>) -> SubstrateBuilder {
        SubstrateBuilder::new(rpc_url, Network::Custom {
            ss58_prefix: crate::types::GENERIC_SS58_PREFIX,
        })
    }

    /// Create a builder on top of an existing transport.
    pub fn with_engine(rpc: Arc<dyn RpcEngine>) -> SubstrateBuilder {
        let mut builder = Substrate::custom("");
        builder.engine = Some(rpc);
        builder
    }

    /// Create a builder from environment variables.
    ///
    /// - `SUBSTRATE_RPC_URL` (optional): an RPC URL, or one of `polkadot`,
    ///   `kusama`, `westend`. Defaults to `westend`.
    /// - `SUBSTRATE_SEED` (optional): signing key, see [`EnvSigner`].
    /// - `SUBSTRATE_CRYPTO` (optional): crypto of a bare seed.
    ///
    /// Metadata still has to be registered on the returned builder.
    ///
    /// # Errors
    ///
    /// Returns an error if `SUBSTRATE_SEED` is set but invalid.
    pub fn from_env() -> Result<SubstrateBuilder, Error> {
        let network = std::env::var("SUBSTRATE_RPC_URL").ok();
        let mut builder = match network.as_deref() {
            None => Substrate::westend(),
            Some(name) => match Network::from_name(name) {
                Some(network) => SubstrateBuilder::for_network(network),
                None => Substrate::custom(name),
            },
        };

        if std::env::var("SUBSTRATE_SEED").is_ok() {
            builder = builder.signer(EnvSigner::new()?);
        }
        Ok(builder)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The underlying transport.
    pub fn rpc(&self) -> &Arc<dyn RpcEngine> {
        &self.rpc
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The default signer's account, if a signer is configured.
    pub fn account_id(&self) -> Option<&AccountId> {
        self.signer.as_ref().map(|s| s.account_id())
    }

    /// The transaction pipeline.
    pub fn service(&self) -> &TransactionService {
        &self.service
    }

    /// The signed-extension resolver shared by every request.
    pub fn resolver(&self) -> &ExtensionResolver {
        self.service.resolver()
    }

    // ========================================================================
    // Chain queries
    // ========================================================================

    pub async fn runtime_version(&self) -> Result<RuntimeVersion, Error> {
        Ok(request_as(self.rpc.as_ref(), "state_getRuntimeVersion", vec![]).await?)
    }

    pub async fn finalized_head(&self) -> Result<H256, Error> {
        Ok(request_as(self.rpc.as_ref(), "chain_getFinalizedHead", vec![]).await?)
    }

    /// Header of `hash`, or `None` if the node does not know the block.
    pub async fn header(&self, hash: H256) -> Result<Option<Header>, Error> {
        Ok(request_as(self.rpc.as_ref(), "chain_getHeader", vec![hash.to_string().into()]).await?)
    }

    /// Next usable nonce of `account`, including pending pool transactions.
    pub async fn account_next_index(&self, account: &AccountId) -> Result<u32, Error> {
        let ss58 = account.to_ss58(self.network.ss58_prefix());
        let nonce: u64 =
            request_as(self.rpc.as_ref(), "system_accountNextIndex", vec![ss58.into()]).await?;
        u32::try_from(nonce).map_err(|_| {
            RpcError::InvalidResponse(format!("nonce {} out of range", nonce)).into()
        })
    }

    // ========================================================================
    // Extrinsics
    // ========================================================================

    /// Start an extrinsic request signed by the default signer.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use substrate_kit::*;
    /// # async fn example(client: Substrate, a: Call, b: Call) -> Result<(), Error> {
    /// // Two calls become one Utility.batch_all
    /// let watch = client.extrinsic().call(a).call(b).submit_and_watch().await?;
    /// let block = watch.wait_for_finalized().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn extrinsic(&self) -> ExtrinsicRequest {
        ExtrinsicRequest::new(self.service.clone(), self.signer.clone())
    }

    /// `Balances.transfer_keep_alive` from the default signer.
    pub fn transfer(&self, dest: AccountId, amount: u128) -> ExtrinsicRequest {
        self.extrinsic().call(transfer_call(dest, amount))
    }
}

/// `Balances.transfer_keep_alive { dest, value }`.
pub fn transfer_call(dest: AccountId, amount: u128) -> Call {
    Call::new(
        "Balances",
        "transfer_keep_alive",
        Value::named([
            ("dest", Value::Bytes(dest.as_bytes().to_vec())),
            ("value", Value::uint(amount)),
        ]),
    )
}

impl std::fmt::Debug for Substrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Substrate")
            .field("network", &self.network)
            .field("account_id", &self.account_id())
            .field("service", &self.service)
            .finish()
    }
}

// ============================================================================
// SubstrateBuilder
// ============================================================================

/// Builder for a [`Substrate`] client.
///
/// `build` uses HTTP. `connect` also accepts `ws://` and `wss://` URLs,
/// which are required for [`submit_and_watch`](ExtrinsicRequest::submit_and_watch).
pub struct SubstrateBuilder {
    rpc_url: String,
    network: Network,
    engine: Option<Arc<dyn RpcEngine>>,
    signer: Option<Arc<dyn Signer>>,
    runtime: Option<Arc<dyn RuntimeProvider>>,
    metadata: Vec<(u32, Arc<RuntimeMetadata>)>,
    retry_config: RetryConfig,
    service_config: ServiceConfig,
    resolver: ExtensionResolver,
}

impl SubstrateBuilder {
    fn new(rpc_url: impl Into<String>, network: Network) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            network,
            engine: None,
            signer: None,
            runtime: None,
            metadata: Vec::new(),
            retry_config: RetryConfig::default(),
            service_config: ServiceConfig::default(),
            resolver: ExtensionResolver::new(),
        }
    }

    fn for_network(network: Network) -> Self {
        let url = network.default_rpc_url().unwrap_or_default();
        let mut builder = Self::new(url, network);
        builder.service_config.ss58_prefix = network.ss58_prefix();
        builder
    }

    /// Set the default signer.
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Sign with an in-memory key of the form `<crypto>:0x<seed>`.
    pub fn credentials(self, secret_key: impl AsRef<str>) -> Result<Self, Error> {
        Ok(self.signer(InMemorySigner::new(secret_key)?))
    }

    /// Preload metadata for a runtime spec version instead of downloading it
    /// with `state_getMetadata` on first use.
    pub fn metadata(mut self, spec_version: u32, metadata: impl Into<Arc<RuntimeMetadata>>) -> Self {
        self.metadata.push((spec_version, metadata.into()));
        self
    }

    /// Supply runtime contexts from elsewhere. Metadata registered with
    /// [`metadata`](Self::metadata) is then ignored.
    pub fn runtime_provider(mut self, provider: impl RuntimeProvider + 'static) -> Self {
        self.runtime = Some(Arc::new(provider));
        self
    }

    /// Retry policy of the HTTP transport. Defaults to no retries.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Timeouts and nonce handling of the transaction pipeline.
    pub fn service_config(mut self, config: ServiceConfig) -> Self {
        self.service_config = config;
        self
    }

    /// How to handle signed extensions this crate does not know.
    pub fn extension_policy(mut self, policy: UnknownExtensionPolicy) -> Self {
        self.resolver = self.resolver.with_policy(policy);
        self
    }

    /// Treat a chain-specific extension identifier as a known kind.
    pub fn extension_override(mut self, identifier: impl Into<String>, kind: ExtensionKind) -> Self {
        self.resolver = self.resolver.with_override(identifier, kind);
        self
    }

    /// Build over HTTP, or over the transport given to
    /// [`Substrate::with_engine`].
    pub fn build(self) -> Substrate {
        let engine = match &self.engine {
            Some(engine) => engine.clone(),
            None => Arc::new(RpcClient::with_retry_config(
                self.rpc_url.clone(),
                self.retry_config.clone(),
            )),
        };
        self.finish(engine)
    }

    /// Like [`build`](Self::build), but opens a WebSocket connection for
    /// `ws://` and `wss://` URLs.
    pub async fn connect(self) -> Result<Substrate, Error> {
        if self.engine.is_none()
            && (self.rpc_url.starts_with("ws://") || self.rpc_url.starts_with("wss://"))
        {
            let ws = WsRpcClient::connect(self.rpc_url.clone()).await?;
            return Ok(self.finish(Arc::new(ws)));
        }
        Ok(self.build())
    }

    fn finish(self, rpc: Arc<dyn RpcEngine>) -> Substrate {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => {
                let provider = RpcRuntimeProvider::new(rpc.clone());
                for (spec_version, metadata) in self.metadata {
                    provider.insert_metadata(spec_version, metadata);
                }
                Arc::new(provider)
            }
        };

        tracing::debug!(network = %self.network, url = %self.rpc_url, "building client");
        let service = TransactionService::new(rpc.clone(), runtime)
            .with_config(self.service_config)
            .with_resolver(Arc::new(self.resolver));

        Substrate {
            rpc,
            service: Arc::new(service),
            signer: self.signer,
            network: self.network,
        }
    }
}

impl From<SubstrateBuilder> for Substrate {
    fn from(builder: SubstrateBuilder) -> Self {
        builder.build()
    }
}

impl std::fmt::Debug for SubstrateBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstrateBuilder")
            .field("rpc_url", &self.rpc_url)
            .field("network", &self.network)
            .field("has_signer", &self.signer.is_some())
            .field("service_config", &self.service_config)
            .finish()
    }
}
