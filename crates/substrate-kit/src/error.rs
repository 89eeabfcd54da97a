//! Error types for substrate-kit.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) - Main error type, returned by most operations
//!   - [`CodecError`] - SCALE encoding/decoding failures
//!   - [`RpcError`] - Transport and node errors (timeouts, RPC error payloads)
//!   - [`SignerError`] - Signing operation failures
//!   - [`ParseAddressError`] - Invalid SS58 / hex address
//!   - [`ParseKeyError`] - Invalid secret key or seed
//!   - [`ParseHashError`] - Invalid `0x` hash
//!
//! Builder-level errors ([`Error::MissingCall`], [`Error::MissingAddress`], ...)
//! are deterministic usage errors and are never worth retrying. Transport
//! errors are surfaced verbatim; use [`RpcError::is_retryable`] to decide
//! whether to retry at the call site.
//!
//! # Example
//!
//! ```rust,no_run
//! use substrate_kit::*;
//!
//! # async fn example(client: Substrate, call: Call) -> Result<(), Error> {
//! match client.extrinsic().call(call).estimate_fee().await {
//!     Ok(fee) => println!("fee: {}", fee.partial_fee),
//!     Err(Error::UnsupportedBatch) => println!("chain has no utility pallet"),
//!     Err(Error::Rpc(e)) if e.is_retryable() => println!("try again later: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

/// Error parsing an SS58 or hex address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid address length: {0} bytes")]
    InvalidLength(usize),

    #[error("Invalid SS58 checksum")]
    InvalidChecksum,

    #[error("Unsupported SS58 prefix: {0}")]
    InvalidPrefix(u16),
}

/// Error parsing a secret key or seed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Invalid key format: expected '<crypto>:0x<32-byte seed>'")]
    InvalidFormat,

    #[error("Unknown crypto type: '{0}'")]
    UnknownCryptoType(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// Error parsing a 32-byte hash.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Error during signing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Signer produced {actual} signature bytes, expected {expected}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    #[error("Signer for {signer} cannot sign for {requested}")]
    AccountMismatch { signer: String, requested: String },
}

// ============================================================================
// Codec Errors
// ============================================================================

/// SCALE encoding and decoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("Value does not fit in {width} bytes")]
    Overflow { width: usize },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unknown type id {0}")]
    UnknownType(u32),

    #[error("Unknown variant '{name}' of {type_name}")]
    UnknownVariant { type_name: String, name: String },

    #[error("Unknown variant index {index} of {type_name}")]
    UnknownVariantIndex { type_name: String, index: u8 },

    #[error("Missing field '{0}'")]
    MissingField(String),

    #[error("Invalid compact encoding")]
    InvalidCompact,

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    #[error("Invalid value: {0}")]
    Invalid(String),
}

// ============================================================================
// RPC Errors
// ============================================================================

/// RPC-specific errors.
#[derive(Debug, Error)]
pub enum RpcError {
    // ─── Network/Transport ───
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request '{method}' timed out after {timeout_ms} ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // ─── Node Errors ───
    #[error("RPC error: {message} (code: {code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid transaction: {message}")]
    InvalidTransaction {
        message: String,
        data: Option<serde_json::Value>,
    },

    // ─── Subscriptions ───
    #[error("Subscriptions are not supported by this transport")]
    SubscriptionsUnsupported,

    #[error("Subscription closed by the node")]
    SubscriptionClosed,
}

/// Code the node uses for extrinsics rejected by the transaction pool.
const INVALID_TRANSACTION_CODE: i64 = 1010;

impl RpcError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Http(e) => e.is_timeout() || e.is_connect(),
            RpcError::Timeout { .. } => true,
            RpcError::Connection(_) => true,
            RpcError::Network { retryable, .. } => *retryable,
            RpcError::Rpc { code, .. } => *code == -32000 || *code == -32603,
            _ => false,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Build an error from a JSON-RPC error object.
    pub fn from_payload(code: i64, message: String, data: Option<serde_json::Value>) -> Self {
        if code == INVALID_TRANSACTION_CODE {
            return RpcError::InvalidTransaction { message, data };
        }
        RpcError::Rpc {
            code,
            message,
            data,
        }
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for substrate-kit operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Builder ───
    #[error("Extrinsic has no call. Add one with .call() or .raw_call().")]
    MissingCall,

    #[error("Extrinsic has no nonce. Set it with .nonce() before signing.")]
    MissingNonce,

    #[error("Extrinsic has no sender address. Set it with .address() before signing.")]
    MissingAddress,

    #[error("Unsupported signed extension: {0}")]
    UnsupportedSignedExtension(String),

    #[error("Runtime does not expose Utility.batch / Utility.batch_all")]
    UnsupportedBatch,

    // ─── Configuration ───
    #[error("No signer configured. Call .signer() on SubstrateBuilder or .sign_with() on the request.")]
    NoSigner,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    // ─── Pipeline ───
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Extrinsic {hash} was not included: {status}")]
    NotIncluded { hash: crate::types::H256, status: String },

    // ─── Nested ───
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error(transparent)]
    ParseAddress(#[from] ParseAddressError),

    #[error(transparent)]
    ParseKey(#[from] ParseKeyError),

    #[error(transparent)]
    ParseHash(#[from] ParseHashError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for builder usage errors, which never succeed on retry.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::MissingCall
                | Error::MissingNonce
                | Error::MissingAddress
                | Error::UnsupportedSignedExtension(_)
                | Error::UnsupportedBatch
                | Error::NoSigner
        )
    }
}
