//! Client module for submitting extrinsics to Substrate nodes.
//!
//! - [`Substrate`]: the main client, built with [`SubstrateBuilder`]
//! - [`TransactionService`]: the fetch, sign and submit pipeline behind it
//! - [`RpcEngine`]: transport trait, implemented by [`RpcClient`] (HTTP) and
//!   [`WsRpcClient`] (WebSocket, with subscriptions)
//!
//! # Signers
//!
//! | Signer | Use Case |
//! |--------|----------|
//! | [`InMemorySigner`] | Scripts and tests with a key in memory |
//! | [`EnvSigner`] | CI via `SUBSTRATE_SEED` / `SUBSTRATE_CRYPTO` |
//!
//! Custom signers (hardware wallets, remote signers) implement [`Signer`]
//! with a [`SigningBackend`].

mod nonce_manager;
mod rpc;
mod service;
mod signer;
mod substrate;
mod ws;

pub use nonce_manager::NonceManager;
pub use rpc::{RetryConfig, RpcClient, RpcEngine, Subscription, request_as};
pub use service::{ExtrinsicRequest, ExtrinsicWatch, ServiceConfig, TransactionService};
pub use signer::{EnvSigner, InMemorySigner, Signer, SigningBackend, SigningKey};
pub use substrate::{Substrate, SubstrateBuilder, transfer_call};
pub use ws::WsRpcClient;
