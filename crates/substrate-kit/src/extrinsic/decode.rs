//! Decoding extrinsics back into their parts.

use crate::codec::{Value, decode_compact, decode_length, decode_value, take};
use crate::error::{CodecError, Error};
use crate::metadata::{DecodedCall, RuntimeMetadata};
use crate::types::Era;

use super::builder::{EXTRINSIC_VERSION, SIGNED_FLAG, SignedExtra};

/// The signature block of a decoded extrinsic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSignature {
    pub address: Value,
    pub signature: Value,
    pub extra: SignedExtra,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedExtrinsic {
    pub version: u8,
    pub signature: Option<DecodedSignature>,
    pub call: DecodedCall,
}

/// Decode a length-prefixed extrinsic as produced by
/// [`Extrinsic::encode`](super::Extrinsic::encode).
///
/// The signed extra is read as `era ++ compact(nonce) ++ compact(tip)`, the
/// layout the builder writes.
pub fn decode_extrinsic(metadata: &RuntimeMetadata, bytes: &[u8]) -> Result<DecodedExtrinsic, Error> {
    let mut input = bytes;
    let len = decode_length(&mut input)?;
    if len != input.len() {
        return Err(CodecError::Invalid(format!(
            "length prefix says {} bytes, {} follow",
            len,
            input.len()
        ))
        .into());
    }

    let version_byte = take(&mut input, 1)?[0];
    let version = version_byte & !SIGNED_FLAG;
    if version != EXTRINSIC_VERSION {
        return Err(Error::Metadata(format!("unsupported extrinsic version {}", version)));
    }

    let signature = if version_byte & SIGNED_FLAG != 0 {
        let address = decode_value(&metadata.types, metadata.address_type(), &mut input)?;
        let signature = decode_value(&metadata.types, metadata.signature_type(), &mut input)?;
        let era = Era::decode(&mut input)?;
        let nonce = decode_compact(&mut input)?;
        let nonce = u32::try_from(nonce).map_err(|_| CodecError::Overflow { width: 4 })?;
        let tip = decode_compact(&mut input)?;
        Some(DecodedSignature {
            address,
            signature,
            extra: SignedExtra { era, nonce, tip },
        })
    } else {
        None
    };

    let call = metadata.decode_call(&mut input)?;
    if !input.is_empty() {
        return Err(CodecError::TrailingBytes(input.len()).into());
    }

    Ok(DecodedExtrinsic {
        version,
        signature,
        call,
    })
}
