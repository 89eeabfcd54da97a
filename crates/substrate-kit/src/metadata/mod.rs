//! Runtime metadata: the chain-supplied description of calls, types and
//! signed extensions that drives encoding.
//!
//! Metadata arrives as the SCALE blob returned by `state_getMetadata`
//! (`frame_metadata::RuntimeMetadataPrefixed`). V14 and V15 are accepted and
//! flattened into [`RuntimeMetadata`], which keeps the `scale_info` type
//! registry and only the pallet and extrinsic details the encoder needs.
//! Each submission pairs it with the chain's current versions in a
//! [`RuntimeContext`], fetched from a [`RuntimeProvider`].

mod provider;

use codec::Decode;
use frame_metadata::v14::RuntimeMetadataV14;
use frame_metadata::v15::RuntimeMetadataV15;
use frame_metadata::{META_RESERVED, RuntimeMetadata as VersionedMetadata, RuntimeMetadataPrefixed};
use scale_info::form::PortableForm;
use scale_info::{Type, TypeDef, Variant};

use crate::codec::Value;
use crate::codec::dynamic::{decode_fields, encode_fields};
use crate::error::{CodecError, Error};
use crate::types::Call;

pub use provider::{ChainRevision, RpcRuntimeProvider, RuntimeContext, RuntimeProvider, StaticRuntime};
pub use scale_info::PortableRegistry;

/// A declared signed extension: its identifier, the type carried in the
/// extrinsic and the type only included in the signing payload.
pub type SignedExtensionMetadata = frame_metadata::v14::SignedExtensionMetadata<PortableForm>;

/// Pallet that hosts the batch calls.
pub const UTILITY_PALLET: &str = "Utility";
/// All-or-nothing batch.
pub const BATCH_ALL_CALL: &str = "batch_all";
/// Best-effort batch.
pub const BATCH_CALL: &str = "batch";

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    pub types: PortableRegistry,
    pub pallets: Vec<PalletInfo>,
    pub extrinsic: ExtrinsicInfo,
}

/// A pallet and the type id of its call enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletInfo {
    pub name: String,
    pub index: u8,
    pub calls: Option<u32>,
}

/// Shape of the chain's extrinsics.
///
/// V15 names the address and signature types directly. For V14 they are
/// read from the `Address` and `Signature` generic parameters of the
/// `UncheckedExtrinsic` type.
#[derive(Debug, Clone)]
pub struct ExtrinsicInfo {
    pub version: u8,
    pub address_type: u32,
    pub signature_type: u32,
    pub signed_extensions: Vec<SignedExtensionMetadata>,
}

/// A call decoded back into names and argument values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    pub pallet: String,
    pub function: String,
    pub args: Value,
}

impl TryFrom<RuntimeMetadataPrefixed> for RuntimeMetadata {
    type Error = Error;

    fn try_from(prefixed: RuntimeMetadataPrefixed) -> Result<Self, Error> {
        if prefixed.0 != META_RESERVED {
            return Err(Error::Metadata(format!(
                "bad metadata magic 0x{:08x}",
                prefixed.0
            )));
        }
        match prefixed.1 {
            VersionedMetadata::V14(v14) => v14.try_into(),
            VersionedMetadata::V15(v15) => Ok(v15.into()),
            other => Err(Error::Metadata(format!(
                "unsupported metadata version {}",
                other.version()
            ))),
        }
    }
}

impl TryFrom<RuntimeMetadataV14> for RuntimeMetadata {
    type Error = Error;

    fn try_from(metadata: RuntimeMetadataV14) -> Result<Self, Error> {
        let extrinsic_ty = metadata.types.resolve(metadata.extrinsic.ty.id);
        let param = |name: &str| {
            extrinsic_ty
                .and_then(|ty| ty.type_params.iter().find(|p| p.name == name))
                .and_then(|p| p.ty.as_ref())
                .map(|ty| ty.id)
                .ok_or_else(|| Error::Metadata(format!("extrinsic {} type not declared", name)))
        };
        let extrinsic = ExtrinsicInfo {
            version: metadata.extrinsic.version,
            address_type: param("Address")?,
            signature_type: param("Signature")?,
            signed_extensions: metadata.extrinsic.signed_extensions,
        };
        let pallets = metadata
            .pallets
            .into_iter()
            .map(|p| PalletInfo {
                name: p.name,
                index: p.index,
                calls: p.calls.map(|c| c.ty.id),
            })
            .collect();

        Ok(Self {
            types: metadata.types,
            pallets,
            extrinsic,
        })
    }
}

impl From<RuntimeMetadataV15> for RuntimeMetadata {
    fn from(metadata: RuntimeMetadataV15) -> Self {
        let extrinsic = ExtrinsicInfo {
            version: metadata.extrinsic.version,
            address_type: metadata.extrinsic.address_ty.id,
            signature_type: metadata.extrinsic.signature_ty.id,
            signed_extensions: metadata
                .extrinsic
                .signed_extensions
                .into_iter()
                .map(|ext| SignedExtensionMetadata {
                    identifier: ext.identifier,
                    ty: ext.ty,
                    additional_signed: ext.additional_signed,
                })
                .collect(),
        };
        let pallets = metadata
            .pallets
            .into_iter()
            .map(|p| PalletInfo {
                name: p.name,
                index: p.index,
                calls: p.calls.map(|c| c.ty.id),
            })
            .collect();

        Self {
            types: metadata.types,
            pallets,
            extrinsic,
        }
    }
}

impl RuntimeMetadata {
    /// Decode the SCALE metadata blob served by `state_getMetadata`.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut input = bytes;
        let prefixed = RuntimeMetadataPrefixed::decode(&mut input)
            .map_err(|e| CodecError::Invalid(format!("runtime metadata: {}", e)))?;
        prefixed.try_into()
    }

    /// Decode a `0x`-prefixed hex metadata blob.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CodecError::Invalid(format!("metadata hex: {}", e)))?;
        Self::decode(&bytes)
    }

    /// Look up a pallet by name.
    pub fn pallet(&self, name: &str) -> Option<&PalletInfo> {
        self.pallets.iter().find(|p| p.name == name)
    }

    /// Look up a call: returns the pallet index, the call enum type and the
    /// call's variant.
    pub fn call(
        &self,
        pallet: &str,
        function: &str,
    ) -> Option<(u8, &Type<PortableForm>, &Variant<PortableForm>)> {
        let pallet = self.pallet(pallet)?;
        let calls_ty = self.types.resolve(pallet.calls?)?;
        let TypeDef::Variant(variants) = &calls_ty.type_def else {
            return None;
        };
        let variant = variants.variants.iter().find(|v| v.name == function)?;
        Some((pallet.index, calls_ty, variant))
    }

    /// Whether the runtime exposes `pallet.function`.
    pub fn has_call(&self, pallet: &str, function: &str) -> bool {
        self.call(pallet, function).is_some()
    }

    /// SCALE-encode a call: pallet index, call index, then the arguments.
    pub fn encode_call(&self, call: &Call) -> Result<Vec<u8>, Error> {
        let (pallet_index, calls_ty, variant) = self
            .call(&call.pallet, &call.function)
            .ok_or_else(|| {
                Error::Metadata(format!("call {}.{} not found", call.pallet, call.function))
            })?;

        let mut out = vec![pallet_index, variant.index];
        encode_fields(&self.types, calls_ty, &variant.fields, &call.args, &mut out)?;
        Ok(out)
    }

    /// Decode a call from the front of `input`.
    pub fn decode_call(&self, input: &mut &[u8]) -> Result<DecodedCall, Error> {
        let mut cursor = *input;
        let header = crate::codec::take(&mut cursor, 2)?;
        let (pallet_index, call_index) = (header[0], header[1]);

        let pallet = self
            .pallets
            .iter()
            .find(|p| p.index == pallet_index)
            .ok_or_else(|| Error::Metadata(format!("no pallet with index {}", pallet_index)))?;
        let calls_ty = pallet
            .calls
            .and_then(|ty| self.types.resolve(ty))
            .ok_or_else(|| Error::Metadata(format!("pallet {} has no calls", pallet.name)))?;
        let TypeDef::Variant(variants) = &calls_ty.type_def else {
            return Err(Error::Metadata(format!(
                "call type of {} is not an enum",
                pallet.name
            )));
        };
        let variant = variants
            .variants
            .iter()
            .find(|v| v.index == call_index)
            .ok_or_else(|| CodecError::UnknownVariantIndex {
                type_name: format!("{}::Call", pallet.name),
                index: call_index,
            })?;

        let args = decode_fields(&self.types, &variant.fields, &mut cursor)?;
        *input = cursor;
        Ok(DecodedCall {
            pallet: pallet.name.clone(),
            function: variant.name.clone(),
            args: Value::Composite(args),
        })
    }

    /// Type id of the extrinsic sender address.
    pub fn address_type(&self) -> u32 {
        self.extrinsic.address_type
    }

    /// Type id of the extrinsic signature.
    pub fn signature_type(&self) -> u32 {
        self.extrinsic.signature_type
    }

    /// Resolve a type id, failing with a codec error when it is unknown.
    pub fn resolve(&self, type_id: u32) -> Result<&Type<PortableForm>, Error> {
        self.types
            .resolve(type_id)
            .ok_or(Error::Codec(CodecError::UnknownType(type_id)))
    }

    /// Whether a type encodes to zero bytes (unit tuples, empty composites,
    /// `PhantomData`-only structs).
    pub fn is_empty_type(&self, type_id: u32) -> bool {
        match self.types.resolve(type_id).map(|t| &t.type_def) {
            Some(TypeDef::Tuple(t)) => t.fields.iter().all(|ty| self.is_empty_type(ty.id)),
            Some(TypeDef::Composite(c)) => c.fields.iter().all(|f| self.is_empty_type(f.ty.id)),
            Some(TypeDef::Array(a)) => a.len == 0 || self.is_empty_type(a.type_param.id),
            _ => false,
        }
    }
}
