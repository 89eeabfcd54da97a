//! Cryptographic key types for Substrate accounts.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use rand::RngCore;
use rand::rngs::OsRng;
use schnorrkel::{ExpansionMode, MiniSecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ParseKeyError, SignerError};

use super::account::AccountId;
use super::hash::blake2_256;

/// Signing context used by sr25519 on every Substrate chain.
const SR25519_CONTEXT: &[u8] = b"substrate";

/// Signature scheme of an account.
///
/// The discriminant is the variant index of the scheme in the runtime's
/// `MultiSignature` enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CryptoType {
    Ed25519 = 0,
    Sr25519 = 1,
    Ecdsa = 2,
}

impl CryptoType {
    /// Get the string name for this crypto type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoType::Ed25519 => "ed25519",
            CryptoType::Sr25519 => "sr25519",
            CryptoType::Ecdsa => "ecdsa",
        }
    }

    /// Variant name used by `MultiSignature` in runtime metadata.
    pub fn variant_name(&self) -> &'static str {
        match self {
            CryptoType::Ed25519 => "Ed25519",
            CryptoType::Sr25519 => "Sr25519",
            CryptoType::Ecdsa => "Ecdsa",
        }
    }

    /// Index of this scheme in `MultiSignature`.
    pub fn variant_index(&self) -> u8 {
        *self as u8
    }

    /// Length in bytes of a raw signature.
    pub fn signature_len(&self) -> usize {
        match self {
            CryptoType::Ed25519 | CryptoType::Sr25519 => 64,
            CryptoType::Ecdsa => 65,
        }
    }

    /// Length in bytes of a public key.
    pub fn public_key_len(&self) -> usize {
        match self {
            CryptoType::Ed25519 | CryptoType::Sr25519 => 32,
            CryptoType::Ecdsa => 33,
        }
    }
}

impl FromStr for CryptoType {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(CryptoType::Ed25519),
            "sr25519" => Ok(CryptoType::Sr25519),
            "ecdsa" | "secp256k1" => Ok(CryptoType::Ecdsa),
            other => Err(ParseKeyError::UnknownCryptoType(other.to_string())),
        }
    }
}

impl Display for CryptoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PublicKey
// ============================================================================

/// A public key tagged with its signature scheme.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    crypto: CryptoType,
    data: Vec<u8>,
}

impl PublicKey {
    /// Get the crypto type.
    pub fn crypto_type(&self) -> CryptoType {
        self.crypto
    }

    /// Get the raw key bytes (compressed SEC1 for ecdsa).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The on-chain account id controlled by this key.
    ///
    /// Ed25519 and sr25519 keys are their own account id; ecdsa accounts are
    /// the Blake2b-256 hash of the compressed public key.
    pub fn to_account_id(&self) -> AccountId {
        match self.crypto {
            CryptoType::Ecdsa => AccountId::from_bytes(blake2_256(&self.data)),
            CryptoType::Ed25519 | CryptoType::Sr25519 => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&self.data[..32]);
                AccountId::from_bytes(bytes)
            }
        }
    }

    /// Verify a raw signature over `message`.
    ///
    /// Ecdsa signatures are checked against the Blake2b-256 hash of the
    /// message, matching how [`SecretKey::sign`] produces them.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        if signature.len() != self.crypto.signature_len() {
            return false;
        }
        match self.crypto {
            CryptoType::Ed25519 => {
                let Ok(key_bytes) = <[u8; 32]>::try_from(self.data.as_slice()) else {
                    return false;
                };
                let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
                    return false;
                };
                let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(message, &sig).is_ok()
            }
            CryptoType::Sr25519 => {
                let Ok(key) = schnorrkel::PublicKey::from_bytes(&self.data) else {
                    return false;
                };
                let Ok(sig) = schnorrkel::Signature::from_bytes(signature) else {
                    return false;
                };
                key.verify_simple(SR25519_CONTEXT, message, &sig).is_ok()
            }
            CryptoType::Ecdsa => {
                let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.data) else {
                    return false;
                };
                let Ok(sig) = k256::ecdsa::Signature::from_slice(&signature[..64]) else {
                    return false;
                };
                key.verify_prehash(&blake2_256(message), &sig).is_ok()
            }
        }
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{}", self.crypto.as_str(), hex::encode(&self.data))
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ============================================================================
// SecretKey
// ============================================================================

/// A 32-byte secret seed for one of the supported signature schemes.
///
/// The text form is `<crypto>:0x<hex seed>`, e.g.
/// `sr25519:0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a`.
#[derive(Clone)]
pub struct SecretKey {
    crypto: CryptoType,
    seed: [u8; 32],
}

impl SecretKey {
    /// Generate a new random key.
    pub fn generate(crypto: CryptoType) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self { crypto, seed }
    }

    /// Create a key from a raw 32-byte seed.
    pub fn from_seed(crypto: CryptoType, seed: [u8; 32]) -> Self {
        Self { crypto, seed }
    }

    /// Get the crypto type.
    pub fn crypto_type(&self) -> CryptoType {
        self.crypto
    }

    /// Get the raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.seed
    }

    /// Derive the public key.
    pub fn public_key(&self) -> Result<PublicKey, SignerError> {
        let data = match self.crypto {
            CryptoType::Ed25519 => SigningKey::from_bytes(&self.seed)
                .verifying_key()
                .to_bytes()
                .to_vec(),
            CryptoType::Sr25519 => self.sr25519_keypair()?.public.to_bytes().to_vec(),
            CryptoType::Ecdsa => self
                .ecdsa_key()?
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
        };
        Ok(PublicKey {
            crypto: self.crypto,
            data,
        })
    }

    /// The account id controlled by this key.
    pub fn account_id(&self) -> Result<AccountId, SignerError> {
        Ok(self.public_key()?.to_account_id())
    }

    /// Sign a message, returning the raw signature bytes.
    ///
    /// Ed25519 signatures are deterministic. Sr25519 signatures are
    /// randomized. Ecdsa signs the Blake2b-256 hash of the message and
    /// returns 65 bytes (`r || s || recovery id`).
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        match self.crypto {
            CryptoType::Ed25519 => {
                let signing_key = SigningKey::from_bytes(&self.seed);
                Ok(signing_key.sign(message).to_bytes().to_vec())
            }
            CryptoType::Sr25519 => {
                let keypair = self.sr25519_keypair()?;
                Ok(keypair
                    .sign_simple(SR25519_CONTEXT, message)
                    .to_bytes()
                    .to_vec())
            }
            CryptoType::Ecdsa => {
                let key = self.ecdsa_key()?;
                let (signature, recovery_id) = key
                    .sign_prehash_recoverable(&blake2_256(message))
                    .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
                let mut out = signature.to_bytes().to_vec();
                out.push(recovery_id.to_byte());
                Ok(out)
            }
        }
    }

    fn sr25519_keypair(&self) -> Result<schnorrkel::Keypair, SignerError> {
        let mini = MiniSecretKey::from_bytes(&self.seed)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Ok(mini.expand_to_keypair(ExpansionMode::Ed25519))
    }

    fn ecdsa_key(&self) -> Result<k256::ecdsa::SigningKey, SignerError> {
        k256::ecdsa::SigningKey::from_slice(&self.seed)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))
    }
}

impl FromStr for SecretKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (crypto, data_str) = s.split_once(':').ok_or(ParseKeyError::InvalidFormat)?;
        let crypto: CryptoType = crypto.parse()?;

        let digits = data_str
            .strip_prefix("0x")
            .ok_or(ParseKeyError::InvalidFormat)?;
        let data = hex::decode(digits).map_err(|e| ParseKeyError::InvalidHex(e.to_string()))?;
        let seed: [u8; 32] =
            data.as_slice()
                .try_into()
                .map_err(|_| ParseKeyError::InvalidLength {
                    expected: 32,
                    actual: data.len(),
                })?;

        if crypto == CryptoType::Ecdsa {
            k256::ecdsa::SigningKey::from_slice(&seed)
                .map_err(|e| ParseKeyError::InvalidKey(e.to_string()))?;
        }

        Ok(Self { crypto, seed })
    }
}

impl TryFrom<&str> for SecretKey {
    type Error = ParseKeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{}", self.crypto.as_str(), hex::encode(self.seed))
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({}:***)", self.crypto.as_str())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = serde::Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
