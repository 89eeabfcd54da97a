//! Signer trait and implementations.
//!
//! A `Signer` knows which account it signs for and hands out a [`SigningKey`]
//! for each signature. Signing is asynchronous so that hardware wallets or
//! remote signers can be plugged in through [`SigningBackend`].
//!
//! # Implementations
//!
//! - [`InMemorySigner`] - Single key stored in memory
//! - [`EnvSigner`] - Key loaded from environment variables
//!
//! # Example
//!
//! ```rust,no_run
//! use substrate_kit::{InMemorySigner, Substrate};
//!
//! # async fn example() -> Result<(), substrate_kit::Error> {
//! let signer = InMemorySigner::new(
//!     "sr25519:0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a"
//! )?;
//!
//! let client = Substrate::westend()
//!     .signer(signer)
//!     .build();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{Error, SignerError};
use crate::types::{AccountId, CryptoType, PublicKey, SecretKey};

// ============================================================================
// Signer Trait
// ============================================================================

/// Trait for signing extrinsics.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use substrate_kit::{AccountId, CryptoType, SecretKey, Signer, SigningKey};
///
/// struct MyCustomSigner {
///     account_id: AccountId,
///     secret_key: SecretKey,
/// }
///
/// impl Signer for MyCustomSigner {
///     fn account_id(&self) -> &AccountId {
///         &self.account_id
///     }
///
///     fn crypto_type(&self) -> CryptoType {
///         self.secret_key.crypto_type()
///     }
///
///     fn key(&self) -> SigningKey {
///         SigningKey::new(self.secret_key.clone()).unwrap()
///     }
/// }
/// ```
pub trait Signer: Send + Sync {
    /// The account this signer signs for.
    fn account_id(&self) -> &AccountId;

    /// Signature scheme of the keys this signer hands out.
    fn crypto_type(&self) -> CryptoType;

    /// Get a key for signing.
    fn key(&self) -> SigningKey;
}

impl Signer for Arc<dyn Signer> {
    fn account_id(&self) -> &AccountId {
        (**self).account_id()
    }

    fn crypto_type(&self) -> CryptoType {
        (**self).crypto_type()
    }

    fn key(&self) -> SigningKey {
        (**self).key()
    }
}

// ============================================================================
// SigningKey
// ============================================================================

/// A key that can sign messages.
///
/// Bundles a public key with the ability to sign with the matching private
/// key. For in-memory keys signing is instant; other backends may prompt a
/// user or call out to a remote service.
pub struct SigningKey {
    public_key: PublicKey,
    backend: Arc<dyn SigningBackend>,
}

impl SigningKey {
    /// Create a signing key from a secret key.
    pub fn new(secret_key: SecretKey) -> Result<Self, SignerError> {
        let public_key = secret_key.public_key()?;
        Ok(Self {
            public_key,
            backend: Arc::new(SecretKeyBackend { secret_key }),
        })
    }

    /// Create a signing key from a custom backend.
    pub fn from_backend(public_key: PublicKey, backend: Arc<dyn SigningBackend>) -> Self {
        Self {
            public_key,
            backend,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn crypto_type(&self) -> CryptoType {
        self.public_key.crypto_type()
    }

    /// Sign a message, returning raw signature bytes.
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.backend.sign(message).await
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self {
            public_key: self.public_key.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.public_key)
            .finish()
    }
}

// ============================================================================
// SigningBackend
// ============================================================================

/// Something that can produce signatures: an in-memory key, a hardware
/// wallet, a remote signer.
pub trait SigningBackend: Send + Sync {
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, SignerError>>;
}

/// In-memory signing backend using a secret key.
struct SecretKeyBackend {
    secret_key: SecretKey,
}

impl SigningBackend for SecretKeyBackend {
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, SignerError>> {
        let sig = self.secret_key.sign(message);
        Box::pin(async move { sig })
    }
}

// ============================================================================
// InMemorySigner
// ============================================================================

/// A signer with a single key stored in memory.
///
/// The account is derived from the key.
///
/// # Example
///
/// ```rust
/// use substrate_kit::InMemorySigner;
///
/// let signer = InMemorySigner::new(
///     "ed25519:0x9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60"
/// ).unwrap();
/// ```
#[derive(Clone)]
pub struct InMemorySigner {
    account_id: AccountId,
    key: SigningKey,
}

impl InMemorySigner {
    /// Create from a key string of the form `<crypto>:0x<seed>`.
    pub fn new(secret_key: impl AsRef<str>) -> Result<Self, Error> {
        let secret_key: SecretKey = secret_key.as_ref().parse()?;
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Result<Self, Error> {
        let key = SigningKey::new(secret_key)?;
        Ok(Self {
            account_id: key.public_key().to_account_id(),
            key,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }
}

impl std::fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("account_id", &self.account_id)
            .field("public_key", self.key.public_key())
            .finish()
    }
}

impl Signer for InMemorySigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn crypto_type(&self) -> CryptoType {
        self.key.crypto_type()
    }

    fn key(&self) -> SigningKey {
        self.key.clone()
    }
}

// ============================================================================
// EnvSigner
// ============================================================================

/// A signer that loads its key from environment variables.
///
/// By default, reads from:
/// - `SUBSTRATE_SEED` - `0x`-hex seed, or a full `<crypto>:0x<seed>` key
/// - `SUBSTRATE_CRYPTO` - `sr25519` (default), `ed25519` or `ecdsa`; ignored
///   when the seed names its crypto type
///
/// # Example
///
/// ```rust,no_run
/// use substrate_kit::EnvSigner;
///
/// // With SUBSTRATE_SEED set:
/// let signer = EnvSigner::new().unwrap();
/// ```
#[derive(Clone)]
pub struct EnvSigner {
    inner: InMemorySigner,
}

impl EnvSigner {
    /// Load from `SUBSTRATE_SEED` and `SUBSTRATE_CRYPTO`.
    pub fn new() -> Result<Self, Error> {
        Self::from_env_vars("SUBSTRATE_SEED", "SUBSTRATE_CRYPTO")
    }

    /// Load from custom environment variable names.
    pub fn from_env_vars(seed_var: &str, crypto_var: &str) -> Result<Self, Error> {
        let seed = std::env::var(seed_var)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", seed_var)))?;

        let key = if seed.contains(':') {
            seed
        } else {
            let crypto = std::env::var(crypto_var).unwrap_or_else(|_| "sr25519".to_string());
            format!("{}:{}", crypto, seed)
        };

        let inner = InMemorySigner::new(key)?;
        Ok(Self { inner })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.inner.public_key()
    }
}

impl std::fmt::Debug for EnvSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSigner")
            .field("account_id", &self.inner.account_id)
            .field("public_key", self.inner.public_key())
            .finish()
    }
}

impl Signer for EnvSigner {
    fn account_id(&self) -> &AccountId {
        self.inner.account_id()
    }

    fn crypto_type(&self) -> CryptoType {
        self.inner.crypto_type()
    }

    fn key(&self) -> SigningKey {
        self.inner.key()
    }
}

// ============================================================================
// Tests
// ============================================================================
