//! Build, sign and submit extrinsics to Substrate chains.
//!
//! **substrate-kit** takes a call and a signer, reads the runtime's metadata
//! from the node, and turns them into a SCALE-encoded, signed extrinsic.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use substrate_kit::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), substrate_kit::Error> {
//!     let client = Substrate::westend()
//!         .signer(EnvSigner::new()?)
//!         .connect()
//!         .await?;
//!
//!     let dest: AccountId = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty".parse()?;
//!     let block = client
//!         .transfer(dest, 1_000_000_000_000)
//!         .submit_and_watch()
//!         .await?
//!         .wait_for_finalized()
//!         .await?;
//!     println!("finalized in {}", block);
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`codec`]: SCALE primitives and metadata-driven encoding of [`Value`]s
//! - [`metadata`]: decoded runtime metadata and the [`RuntimeContext`]
//! - [`extrinsic`]: signed-extension resolution, [`ExtrinsicBuilder`] and
//!   decoding
//! - [`client`]: transports, signers and the async [`TransactionService`]
//!
//! Each layer is usable on its own. Offline signing needs only the first
//! three:
//!
//! ```rust,ignore
//! use substrate_kit::*;
//!
//! let resolver = ExtensionResolver::new();
//! let key: SecretKey = "sr25519:0x...".parse()?;
//! let hex = ExtrinsicBuilder::new()
//!     .call(call)
//!     .address(key.account_id()?)
//!     .nonce(0)
//!     .sign(|payload| key.sign(payload), key.crypto_type(), &ctx, &resolver)?
//!     .build_hex(&ctx)?;
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod extrinsic;
pub mod metadata;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CodecError, Error, RpcError, SignerError};
pub use types::*;

pub use codec::Value;

pub use extrinsic::{
    DecodedExtrinsic, ExtensionKind, ExtensionResolver, Extrinsic, ExtrinsicBuilder,
    UnknownExtensionPolicy, decode_extrinsic,
};

pub use metadata::{
    ChainRevision, RpcRuntimeProvider, RuntimeContext, RuntimeMetadata, RuntimeProvider,
    StaticRuntime,
};

pub use client::{
    EnvSigner, ExtrinsicRequest, ExtrinsicWatch, InMemorySigner, NonceManager, RetryConfig,
    RpcClient, RpcEngine, ServiceConfig, Signer, SigningBackend, SigningKey, Substrate,
    SubstrateBuilder, TransactionService, WsRpcClient,
};
