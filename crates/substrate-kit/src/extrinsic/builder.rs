//! Extrinsic construction and signing.
//!
//! # Example
//!
//! ```rust,no_run
//! # use substrate_kit::*;
//! # fn example(ctx: RuntimeContext, key: SecretKey, call: Call) -> Result<(), Error> {
//! let resolver = ExtensionResolver::new();
//! let hex = ExtrinsicBuilder::new()
//!     .call(call)
//!     .address(key.account_id()?)
//!     .nonce(3)
//!     .era(Era::mortal(64, 1000), "0x2222222222222222222222222222222222222222222222222222222222222222".parse()?)
//!     .sign(|payload| key.sign(payload), key.crypto_type(), &ctx, &resolver)?
//!     .build_hex(&ctx)?;
//! # Ok(())
//! # }
//! ```

use crate::codec::{Value, encode_compact, encode_value};
use crate::error::{Error, SignerError};
use scale_info::form::PortableForm;
use scale_info::{Type, TypeDef};

use crate::metadata::{BATCH_ALL_CALL, BATCH_CALL, RuntimeContext, RuntimeMetadata, UTILITY_PALLET};
use crate::types::{Address, Call, CallSource, CryptoType, Era, H256, blake2_256};

use super::extensions::ExtensionResolver;

/// Extrinsic format version produced by the builder.
pub const EXTRINSIC_VERSION: u8 = 4;

/// Bit set in the version byte of signed extrinsics.
pub const SIGNED_FLAG: u8 = 0b1000_0000;

/// Signing payloads longer than this are hashed with Blake2b-256 first.
pub const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Fields bound into every signature and carried in the extrinsic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedExtra {
    pub era: Era,
    pub nonce: u32,
    pub tip: u128,
}

impl SignedExtra {
    /// `era ++ compact(nonce) ++ compact(tip)`
    pub fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.era.encode());
        encode_compact(self.nonce as u128, out);
        encode_compact(self.tip, out);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }
}

/// A signature attached to an extrinsic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtrinsicSignature {
    pub address: Address,
    /// Raw signature bytes as returned by the signer.
    pub raw: Vec<u8>,
    pub crypto: CryptoType,
    pub extra: SignedExtra,
    /// Name of the runtime's signature type, e.g. `MultiSignature`.
    pub type_name: String,
    encoded_address: Vec<u8>,
    encoded_signature: Vec<u8>,
}

impl ExtrinsicSignature {
    /// Address as it appears on the wire.
    pub fn encoded_address(&self) -> &[u8] {
        &self.encoded_address
    }

    /// Signature as it appears on the wire: tagged with the crypto variant,
    /// or the bare bytes for runtimes without a signature enum.
    pub fn encoded_signature(&self) -> &[u8] {
        &self.encoded_signature
    }
}

/// A complete extrinsic ready for encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extrinsic {
    /// Encoded call (a batch call when several were added).
    pub call: Vec<u8>,
    pub signature: Option<ExtrinsicSignature>,
}

impl Extrinsic {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// SCALE bytes: `compact(len) ++ version ++ [signature block] ++ call`.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.call.len() + 128);
        match &self.signature {
            Some(sig) => {
                body.push(EXTRINSIC_VERSION | SIGNED_FLAG);
                body.extend_from_slice(&sig.encoded_address);
                body.extend_from_slice(&sig.encoded_signature);
                sig.extra.encode_to(&mut body);
            }
            None => body.push(EXTRINSIC_VERSION),
        }
        body.extend_from_slice(&self.call);

        let mut out = Vec::with_capacity(body.len() + 5);
        encode_compact(body.len() as u128, &mut out);
        out.extend_from_slice(&body);
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }

    /// Blake2b-256 of the encoded extrinsic, as reported by the node on
    /// submission.
    pub fn hash(&self) -> H256 {
        H256::hash(&self.encode())
    }
}

/// Accumulates calls and signing inputs, then signs and encodes.
///
/// Every mutator consumes the builder and returns it. Setting the address,
/// nonce, era or tip drops any attached signature, so a builder never holds a
/// signature over stale inputs.
#[derive(Clone, Debug)]
pub struct ExtrinsicBuilder {
    calls: Vec<CallSource>,
    atomic: bool,
    address: Option<Address>,
    nonce: Option<u32>,
    era: Era,
    block_hash: Option<H256>,
    tip: u128,
    signature: Option<ExtrinsicSignature>,
}

impl Default for ExtrinsicBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtrinsicBuilder {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            atomic: true,
            address: None,
            nonce: None,
            era: Era::Immortal,
            block_hash: None,
            tip: 0,
            signature: None,
        }
    }

    // ========================================================================
    // Signing inputs
    // ========================================================================

    /// Set the sender.
    pub fn address(mut self, address: impl Into<Address>) -> Self {
        self.address = Some(address.into());
        self.signature = None;
        self
    }

    pub fn nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self.signature = None;
        self
    }

    /// Set the mortality window and the hash of the block it starts from.
    pub fn era(mut self, era: Era, block_hash: H256) -> Self {
        self.era = era;
        self.block_hash = Some(block_hash);
        self.signature = None;
        self
    }

    pub fn tip(mut self, tip: u128) -> Self {
        self.tip = tip;
        self.signature = None;
        self
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Append a call, encoded against metadata at build time.
    pub fn call(mut self, call: Call) -> Self {
        self.calls.push(CallSource::Dynamic(call));
        self
    }

    /// Append an already encoded call.
    pub fn raw_call(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.calls.push(CallSource::Raw(bytes.into()));
        self
    }

    /// With several calls, use `Utility.batch_all` (the default) or the
    /// best-effort `Utility.batch`.
    pub fn atomic_batch(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn signature(&self) -> Option<&ExtrinsicSignature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Current era, nonce and tip.
    pub fn signed_extra(&self) -> Result<SignedExtra, Error> {
        Ok(SignedExtra {
            era: self.era,
            nonce: self.nonce.ok_or(Error::MissingNonce)?,
            tip: self.tip,
        })
    }

    /// Encode the final call: the single call, or a batch of all of them.
    pub fn resolve_call(&self, metadata: &RuntimeMetadata) -> Result<Vec<u8>, Error> {
        match self.calls.as_slice() {
            [] => Err(Error::MissingCall),
            [single] => single.encode(metadata),
            calls => {
                let function = if self.atomic { BATCH_ALL_CALL } else { BATCH_CALL };
                let (pallet_index, _, variant) = metadata
                    .call(UTILITY_PALLET, function)
                    .ok_or(Error::UnsupportedBatch)?;

                let mut out = vec![pallet_index, variant.index];
                encode_compact(calls.len() as u128, &mut out);
                for call in calls {
                    out.extend(call.encode(metadata)?);
                }
                Ok(out)
            }
        }
    }

    // ========================================================================
    // Signing
    // ========================================================================

    /// The full signing payload before the long-payload hashing rule:
    /// `call ++ extra ++ additional signed data`.
    pub fn encoded_payload(
        &self,
        ctx: &RuntimeContext,
        resolver: &ExtensionResolver,
    ) -> Result<Vec<u8>, Error> {
        let extra = self.signed_extra()?;
        let mut payload = self.resolve_call(&ctx.metadata)?;
        extra.encode_to(&mut payload);
        let block_hash = self.block_hash.unwrap_or(ctx.genesis_hash);
        resolver.additional_signed(ctx, block_hash, &mut payload)?;
        Ok(payload)
    }

    /// The bytes handed to the signer: the encoded payload, or its
    /// Blake2b-256 digest when it is longer than 256 bytes.
    pub fn signature_payload(
        &self,
        ctx: &RuntimeContext,
        resolver: &ExtensionResolver,
    ) -> Result<Vec<u8>, Error> {
        let payload = self.encoded_payload(ctx, resolver)?;
        if payload.len() > MAX_UNHASHED_PAYLOAD {
            return Ok(blake2_256(&payload).to_vec());
        }
        Ok(payload)
    }

    /// Sign with `signer` and attach the signature.
    pub fn sign<F>(
        self,
        signer: F,
        crypto: CryptoType,
        ctx: &RuntimeContext,
        resolver: &ExtensionResolver,
    ) -> Result<Self, Error>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, SignerError>,
    {
        if self.address.is_none() {
            return Err(Error::MissingAddress);
        }
        let payload = self.signature_payload(ctx, resolver)?;
        let raw = signer(&payload)?;
        self.attach_signature(raw, crypto, ctx)
    }

    /// Attach a signature produced elsewhere over
    /// [`signature_payload`](Self::signature_payload).
    pub fn attach_signature(
        mut self,
        raw: Vec<u8>,
        crypto: CryptoType,
        ctx: &RuntimeContext,
    ) -> Result<Self, Error> {
        let address = self.address.ok_or(Error::MissingAddress)?;
        let extra = self.signed_extra()?;
        if raw.len() != crypto.signature_len() {
            return Err(SignerError::InvalidSignatureLength {
                expected: crypto.signature_len(),
                actual: raw.len(),
            }
            .into());
        }

        let metadata = &ctx.metadata;
        let encoded_address = encode_address(metadata, &address)?;
        let (encoded_signature, type_name) = encode_signature(metadata, &raw, crypto)?;

        self.signature = Some(ExtrinsicSignature {
            address,
            raw,
            crypto,
            extra,
            type_name,
            encoded_address,
            encoded_signature,
        });
        Ok(self)
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Resolve the call and pair it with the attached signature, if any.
    pub fn build_extrinsic(&self, ctx: &RuntimeContext) -> Result<Extrinsic, Error> {
        let version = ctx.metadata.extrinsic.version;
        if version != EXTRINSIC_VERSION {
            return Err(Error::Metadata(format!(
                "unsupported extrinsic version {}",
                version
            )));
        }
        Ok(Extrinsic {
            call: self.resolve_call(&ctx.metadata)?,
            signature: self.signature.clone(),
        })
    }

    pub fn build(&self, ctx: &RuntimeContext) -> Result<Vec<u8>, Error> {
        Ok(self.build_extrinsic(ctx)?.encode())
    }

    /// `0x`-prefixed hex, as accepted by `author_submitExtrinsic`.
    pub fn build_hex(&self, ctx: &RuntimeContext) -> Result<String, Error> {
        Ok(self.build_extrinsic(ctx)?.to_hex())
    }
}

/// Encode the sender per the runtime's address type: a tagged variant such as
/// `MultiAddress::Id`, or the bare account bytes.
fn encode_address(metadata: &RuntimeMetadata, address: &Address) -> Result<Vec<u8>, Error> {
    let type_id = metadata.address_type();
    let ty = metadata.resolve(type_id)?;
    let bytes = Value::Bytes(address.as_bytes().to_vec());
    let value = match &ty.type_def {
        TypeDef::Variant(_) => Value::variant(address.variant_name(), [bytes]),
        _ => bytes,
    };
    let mut out = Vec::new();
    encode_value(&metadata.types, type_id, &value, &mut out)?;
    Ok(out)
}

/// Encode raw signature bytes per the runtime's signature type.
///
/// Returns the encoding and the type name to record with the signature.
fn encode_signature(
    metadata: &RuntimeMetadata,
    raw: &[u8],
    crypto: CryptoType,
) -> Result<(Vec<u8>, String), Error> {
    let type_id = metadata.signature_type();
    let ty = metadata.resolve(type_id)?;
    let bytes = Value::Bytes(raw.to_vec());
    let value = match &ty.type_def {
        TypeDef::Variant(_) => Value::variant(crypto.variant_name(), [bytes]),
        _ => {
            tracing::debug!(type_name = %type_name(ty), "runtime uses a bare signature type");
            bytes
        }
    };
    let mut out = Vec::new();
    encode_value(&metadata.types, type_id, &value, &mut out)?;
    Ok((out, type_name(ty)))
}

fn type_name(ty: &Type<PortableForm>) -> String {
    ty.path.segments.join("::")
}
