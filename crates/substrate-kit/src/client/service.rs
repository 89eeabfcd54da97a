//! The transaction pipeline.
//!
//! Each request runs the same graph:
//!
//! ```text
//! fetch nonce ─────────────────────────────┐
//! finalized head ─> header ─> era ─────────┼─> build + sign ─> estimate | submit | watch
//! runtime context ─────────────────────────┘
//! ```
//!
//! The three branches run concurrently. The first failure ends the request
//! and drops whatever is still in flight; signing only starts once all three
//! have succeeded. Every RPC step has its own timeout, and a
//! [`CancellationToken`] aborts every pending step. Nothing is retried here.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::nonce_manager::NonceManager;
use super::rpc::{RpcEngine, Subscription, request_as};
use super::signer::Signer;
use crate::error::{Error, RpcError};
use crate::extrinsic::{Extrinsic, ExtensionResolver, ExtrinsicBuilder};
use crate::metadata::{RuntimeContext, RuntimeProvider};
use crate::types::{
    AccountId, Call, CryptoType, Era, ExtrinsicStatus, FeeInfo, GENERIC_SS58_PREFIX, H256, Header,
    MORTAL_PERIOD,
};

/// Timeouts and knobs for the pipeline.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Timeout for nonce, head, header and runtime fetches.
    pub fetch_timeout: Duration,
    /// Timeout for fee estimation and submission.
    pub submit_timeout: Duration,
    /// Mortality period for new extrinsics.
    pub mortal_period: u64,
    /// Hand out nonces from a local [`NonceManager`] after the first fetch,
    /// so back-to-back submissions from one account do not collide.
    pub track_nonces: bool,
    /// SS58 prefix used when passing accounts to the node.
    pub ss58_prefix: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(60),
            mortal_period: MORTAL_PERIOD,
            track_nonces: false,
            ss58_prefix: GENERIC_SS58_PREFIX,
        }
    }
}

/// Who an extrinsic is built for.
#[derive(Clone, Copy)]
enum Sender<'a> {
    /// Real signature.
    Signer(&'a dyn Signer),
    /// Fee estimation: a zeroed signature of the right length.
    Dummy(AccountId, CryptoType),
}

impl Sender<'_> {
    fn account(&self) -> AccountId {
        match self {
            Sender::Signer(signer) => *signer.account_id(),
            Sender::Dummy(account, _) => *account,
        }
    }
}

/// Runs extrinsic requests against one node.
pub struct TransactionService {
    rpc: Arc<dyn RpcEngine>,
    runtime: Arc<dyn RuntimeProvider>,
    resolver: Arc<ExtensionResolver>,
    nonces: NonceManager,
    config: ServiceConfig,
}

impl TransactionService {
    pub fn new(rpc: Arc<dyn RpcEngine>, runtime: Arc<dyn RuntimeProvider>) -> Self {
        Self {
            rpc,
            runtime,
            resolver: Arc::new(ExtensionResolver::new()),
            nonces: NonceManager::new(),
            config: ServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<ExtensionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ExtensionResolver {
        &self.resolver
    }

    pub fn rpc(&self) -> &Arc<dyn RpcEngine> {
        &self.rpc
    }

    /// The local nonce cache used when `track_nonces` is on.
    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Estimate the fee of `builder`'s calls sent from `account`.
    ///
    /// Signs with a placeholder of the right length for `crypto`, so no
    /// signer is needed.
    pub async fn estimate_fee(
        &self,
        builder: ExtrinsicBuilder,
        account: AccountId,
        crypto: CryptoType,
        cancel: &CancellationToken,
    ) -> Result<FeeInfo, Error> {
        let span = tracing::debug_span!("estimate_fee", %account);
        async {
            let extrinsic = self
                .prepare(builder, Sender::Dummy(account, crypto), cancel)
                .await?;
            let fee: FeeInfo = self
                .submit_step(cancel, "payment_queryInfo", vec![extrinsic.to_hex().into()])
                .await?;
            tracing::debug!(partial_fee = fee.partial_fee, "estimated fee");
            Ok(fee)
        }
        .instrument(span)
        .await
    }

    /// Sign `builder` with `signer` and return the extrinsic without
    /// submitting it.
    pub async fn build_signed(
        &self,
        builder: ExtrinsicBuilder,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<Extrinsic, Error> {
        let span = tracing::debug_span!("build_signed", account = %signer.account_id());
        self.prepare(builder, Sender::Signer(signer), cancel)
            .instrument(span)
            .await
    }

    /// Sign and submit; returns the extrinsic hash reported by the node.
    pub async fn submit(
        &self,
        builder: ExtrinsicBuilder,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<H256, Error> {
        let account = *signer.account_id();
        let span = tracing::debug_span!("submit", %account);
        async {
            let extrinsic = self.prepare(builder, Sender::Signer(signer), cancel).await?;
            let result: Result<H256, Error> = self
                .submit_step(cancel, "author_submitExtrinsic", vec![extrinsic.to_hex().into()])
                .await;
            self.after_submit(&account, &result);
            let hash = result?;
            tracing::debug!(%hash, "submitted");
            Ok(hash)
        }
        .instrument(span)
        .await
    }

    /// Sign, submit and subscribe to status updates.
    pub async fn submit_and_watch(
        &self,
        builder: ExtrinsicBuilder,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<ExtrinsicWatch, Error> {
        let account = *signer.account_id();
        let span = tracing::debug_span!("submit_and_watch", %account);
        async {
            let extrinsic = self.prepare(builder, Sender::Signer(signer), cancel).await?;
            let hash = extrinsic.hash();
            let params = vec![extrinsic.to_hex().into()];
            let result = self
                .step(cancel, "author_submitAndWatchExtrinsic", self.config.submit_timeout, async {
                    let subscription = self
                        .rpc
                        .subscribe(
                            "author_submitAndWatchExtrinsic",
                            params,
                            "author_unwatchExtrinsic",
                        )
                        .await?;
                    Ok::<_, Error>(subscription)
                })
                .await;
            self.after_submit(&account, &result);
            let subscription = result?;
            tracing::debug!(%hash, subscription = subscription.id(), "watching extrinsic");
            Ok(ExtrinsicWatch { hash, subscription })
        }
        .instrument(span)
        .await
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    async fn prepare(
        &self,
        builder: ExtrinsicBuilder,
        sender: Sender<'_>,
        cancel: &CancellationToken,
    ) -> Result<Extrinsic, Error> {
        if builder.call_count() == 0 {
            return Err(Error::MissingCall);
        }
        let account = sender.account();
        // Fee estimates read the node's nonce and leave the local cache alone.
        let tracked = self.config.track_nonces && matches!(sender, Sender::Signer(_));

        let result = async {
            let (nonce, (era, block_hash), ctx) = futures::try_join!(
                self.fetch_nonce(&account, tracked, cancel),
                self.fetch_era(cancel),
                self.fetch_runtime(cancel),
            )?;

            let builder = builder.address(account).nonce(nonce).era(era, block_hash);
            let builder = self.sign(builder, sender, &ctx, cancel).await?;
            builder.build_extrinsic(&ctx)
        }
        .await;

        if tracked {
            self.release_nonce(&account, &result);
        }
        result
    }

    async fn sign(
        &self,
        builder: ExtrinsicBuilder,
        sender: Sender<'_>,
        ctx: &RuntimeContext,
        cancel: &CancellationToken,
    ) -> Result<ExtrinsicBuilder, Error> {
        match sender {
            Sender::Dummy(_, crypto) => {
                let placeholder = vec![0u8; crypto.signature_len()];
                builder.sign(|_| Ok(placeholder), crypto, ctx, &self.resolver)
            }
            Sender::Signer(signer) => {
                let key = signer.key();
                let payload = builder.signature_payload(ctx, &self.resolver)?;
                let raw = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    raw = key.sign(&payload) => raw?,
                };
                tracing::debug!(crypto = %key.crypto_type(), payload_len = payload.len(), "signed");
                builder.attach_signature(raw, key.crypto_type(), ctx)
            }
        }
    }

    async fn fetch_nonce(
        &self,
        account: &AccountId,
        tracked: bool,
        cancel: &CancellationToken,
    ) -> Result<u32, Error> {
        let fetch = || async {
            let nonce: u64 = self
                .fetch_step(
                    cancel,
                    "system_accountNextIndex",
                    vec![account.to_ss58(self.config.ss58_prefix).into()],
                )
                .await?;
            u32::try_from(nonce).map_err(|_| {
                Error::from(RpcError::InvalidResponse(format!("nonce {} out of range", nonce)))
            })
        };

        let nonce = if tracked {
            self.nonces.next_nonce(account, fetch).await?
        } else {
            fetch().await?
        };
        tracing::debug!(nonce, "fetched nonce");
        Ok(nonce)
    }

    async fn fetch_era(&self, cancel: &CancellationToken) -> Result<(Era, H256), Error> {
        let head: H256 = self.fetch_step(cancel, "chain_getFinalizedHead", vec![]).await?;
        let header: Option<Header> = self
            .fetch_step(cancel, "chain_getHeader", vec![head.to_string().into()])
            .await?;
        let header = header.ok_or_else(|| {
            RpcError::InvalidResponse(format!("no header for finalized block {}", head))
        })?;

        let era = Era::mortal(self.config.mortal_period, header.number);
        tracing::debug!(%head, number = header.number, ?era, "computed era");
        Ok((era, head))
    }

    async fn fetch_runtime(&self, cancel: &CancellationToken) -> Result<RuntimeContext, Error> {
        let ctx = self
            .step(cancel, "runtime", self.config.fetch_timeout, self.runtime.fetch_current())
            .await?;
        tracing::debug!(spec_version = ctx.spec_version, "fetched runtime context");
        Ok(ctx)
    }

    fn after_submit<T>(&self, account: &AccountId, result: &Result<T, Error>) {
        if self.config.track_nonces {
            self.release_nonce(account, result);
        }
    }

    /// A tracked nonce that never reached the pool, or was rejected there as
    /// stale or future, is dropped from the cache. The next request asks the
    /// node, whose next index counts pooled extrinsics.
    fn release_nonce<T>(&self, account: &AccountId, result: &Result<T, Error>) {
        if let Err(e) = result {
            tracing::debug!(%account, error = %e, "dropping cached nonce");
            self.nonces.invalidate(account);
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    async fn fetch_step<R: serde::de::DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: &'static str,
        params: Vec<serde_json::Value>,
    ) -> Result<R, Error> {
        self.rpc_step(cancel, method, params, self.config.fetch_timeout).await
    }

    async fn submit_step<R: serde::de::DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: &'static str,
        params: Vec<serde_json::Value>,
    ) -> Result<R, Error> {
        self.rpc_step(cancel, method, params, self.config.submit_timeout).await
    }

    async fn rpc_step<R: serde::de::DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: &'static str,
        params: Vec<serde_json::Value>,
        timeout: Duration,
    ) -> Result<R, Error> {
        self.step(cancel, method, timeout, async {
            Ok::<_, Error>(request_as(self.rpc.as_ref(), method, params).await?)
        })
        .await
    }

    /// Run one step under the request's cancellation token and a timeout.
    async fn step<T>(
        &self,
        cancel: &CancellationToken,
        name: &'static str,
        timeout: Duration,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(step = name, "cancelled");
                Err(Error::Cancelled)
            }
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(result) => result,
                Err(_) => Err(RpcError::Timeout {
                    method: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into()),
            },
        }
    }
}

impl std::fmt::Debug for TransactionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionService")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish()
    }
}

// ============================================================================
// ExtrinsicWatch
// ============================================================================

/// Status updates for a submitted extrinsic.
///
/// Dropping the watch unsubscribes.
#[derive(Debug)]
pub struct ExtrinsicWatch {
    hash: H256,
    subscription: Subscription,
}

impl ExtrinsicWatch {
    /// Hash of the submitted extrinsic.
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Wait until the extrinsic is in a block; returns the block hash.
    pub async fn wait_for_in_block(self) -> Result<H256, Error> {
        self.wait_for(|status| matches!(status, ExtrinsicStatus::InBlock(_) | ExtrinsicStatus::Finalized(_)))
            .await
    }

    /// Wait until the extrinsic is in a finalized block; returns the block
    /// hash.
    pub async fn wait_for_finalized(self) -> Result<H256, Error> {
        self.wait_for(|status| matches!(status, ExtrinsicStatus::Finalized(_)))
            .await
    }

    async fn wait_for(mut self, done: impl Fn(&ExtrinsicStatus) -> bool) -> Result<H256, Error> {
        while let Some(status) = self.next().await {
            let status = status?;
            tracing::debug!(hash = %self.hash, ?status, "extrinsic status");
            if done(&status) {
                if let Some(block) = status.block_hash() {
                    return Ok(block);
                }
            }
            if status.is_final() {
                return Err(Error::NotIncluded {
                    hash: self.hash,
                    status: format!("{:?}", status),
                });
            }
        }
        Err(RpcError::SubscriptionClosed.into())
    }
}

impl Stream for ExtrinsicWatch {
    type Item = Result<ExtrinsicStatus, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.subscription.poll_next_unpin(cx).map(|item| {
            item.map(|result| {
                result
                    .map_err(Error::from)
                    .and_then(|value| serde_json::from_value(value).map_err(Error::from))
            })
        })
    }
}

// ============================================================================
// ExtrinsicRequest
// ============================================================================

/// Fluent builder for one extrinsic request.
///
/// Created via [`Substrate::extrinsic`](crate::Substrate::extrinsic).
/// Awaiting the request submits it.
///
/// # Example
///
/// ```rust,no_run
/// # use substrate_kit::*;
/// # async fn example(client: Substrate, call: Call) -> Result<(), Error> {
/// let fee = client.extrinsic().call(call.clone()).estimate_fee().await?;
/// println!("fee: {}", fee.partial_fee);
///
/// let hash = client.extrinsic().call(call).tip(1_000).await?;
/// println!("submitted {}", hash);
/// # Ok(())
/// # }
/// ```
pub struct ExtrinsicRequest {
    service: Arc<TransactionService>,
    builder: ExtrinsicBuilder,
    signer: Option<Arc<dyn Signer>>,
    sender: Option<(AccountId, CryptoType)>,
    cancel: CancellationToken,
}

impl ExtrinsicRequest {
    pub(crate) fn new(service: Arc<TransactionService>, signer: Option<Arc<dyn Signer>>) -> Self {
        Self {
            service,
            builder: ExtrinsicBuilder::new(),
            signer,
            sender: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn call(mut self, call: Call) -> Self {
        self.builder = self.builder.call(call);
        self
    }

    pub fn raw_call(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.builder = self.builder.raw_call(bytes);
        self
    }

    pub fn atomic_batch(mut self, atomic: bool) -> Self {
        self.builder = self.builder.atomic_batch(atomic);
        self
    }

    pub fn tip(mut self, tip: u128) -> Self {
        self.builder = self.builder.tip(tip);
        self
    }

    /// Override the signer for this request.
    pub fn sign_with(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Estimate fees as `account` without a signer.
    pub fn sender(mut self, account: AccountId, crypto: CryptoType) -> Self {
        self.sender = Some((account, crypto));
        self
    }

    /// Abort the request when `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Estimate the fee.
    pub async fn estimate_fee(self) -> Result<FeeInfo, Error> {
        let (account, crypto) = match (&self.sender, &self.signer) {
            (Some(sender), _) => *sender,
            (None, Some(signer)) => (*signer.account_id(), signer.crypto_type()),
            (None, None) => return Err(Error::NoSigner),
        };
        self.service
            .estimate_fee(self.builder, account, crypto, &self.cancel)
            .await
    }

    /// Sign and return the extrinsic as `0x` hex for external broadcast.
    pub async fn build_signed(self) -> Result<String, Error> {
        let signer = self.signer.ok_or(Error::NoSigner)?;
        let extrinsic = self
            .service
            .build_signed(self.builder, signer.as_ref(), &self.cancel)
            .await?;
        Ok(extrinsic.to_hex())
    }

    /// Sign and submit. Equivalent to awaiting the request.
    pub async fn submit(self) -> Result<H256, Error> {
        let signer = self.signer.ok_or(Error::NoSigner)?;
        self.service
            .submit(self.builder, signer.as_ref(), &self.cancel)
            .await
    }

    /// Sign, submit and watch for inclusion.
    pub async fn submit_and_watch(self) -> Result<ExtrinsicWatch, Error> {
        let signer = self.signer.ok_or(Error::NoSigner)?;
        self.service
            .submit_and_watch(self.builder, signer.as_ref(), &self.cancel)
            .await
    }
}

impl IntoFuture for ExtrinsicRequest {
    type Output = Result<H256, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.submit())
    }
}

impl std::fmt::Debug for ExtrinsicRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtrinsicRequest")
            .field("builder", &self.builder)
            .field("has_signer", &self.signer.is_some())
            .finish()
    }
}
