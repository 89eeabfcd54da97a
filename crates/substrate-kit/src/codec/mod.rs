//! SCALE primitives.
//!
//! Free functions over `Vec<u8>` (encode) and `&mut &[u8]` (decode). Decoders
//! only advance the input slice when they succeed, so a failed decode leaves
//! the caller's cursor where it was.
//!
//! Compact integers go through `parity-scale-codec`; fixed-width integers of
//! arbitrary byte width (up to 32) are handled here on top of [`U256`].

pub(crate) mod dynamic;
mod value;

use codec::{Compact, Decode, Encode};
use primitive_types::U256;

use crate::error::CodecError;
use crate::types::AccountId;

pub use dynamic::{decode_value, encode_value};
pub use value::{Composite, Value};

/// Widest fixed-width unsigned integer supported (`u256`).
pub const MAX_UINT_WIDTH: usize = 32;

/// Split `n` bytes off the front of `input`.
pub fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::TruncatedInput {
            needed: n,
            available: input.len(),
        });
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

// ============================================================================
// Fixed-width unsigned integers
// ============================================================================

/// Append `value` as exactly `width` little-endian bytes.
///
/// Values that need more than `width` bytes are rejected with
/// [`CodecError::Overflow`] rather than silently truncated.
pub fn encode_fixed_uint(value: U256, width: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if width == 0 || width > MAX_UINT_WIDTH {
        return Err(CodecError::Invalid(format!("unsupported integer width {}", width)));
    }
    if value.bits() > width * 8 {
        return Err(CodecError::Overflow { width });
    }
    out.extend_from_slice(&value.to_little_endian()[..width]);
    Ok(())
}

/// Read exactly `width` little-endian bytes as an unsigned integer.
pub fn decode_fixed_uint(input: &mut &[u8], width: usize) -> Result<U256, CodecError> {
    if width == 0 || width > MAX_UINT_WIDTH {
        return Err(CodecError::Invalid(format!("unsupported integer width {}", width)));
    }
    let bytes = take(input, width)?;
    Ok(U256::from_little_endian(bytes))
}

/// Append a signed integer as `width` bytes of two's complement.
pub fn encode_fixed_int(value: i128, width: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if width == 0 || width > 16 {
        return Err(CodecError::Invalid(format!("unsupported integer width {}", width)));
    }
    let bits = (width * 8) as u32;
    if bits < 128 {
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if value < min || value > max {
            return Err(CodecError::Overflow { width });
        }
    }
    out.extend_from_slice(&value.to_le_bytes()[..width]);
    Ok(())
}

/// Read `width` bytes of two's complement as a signed integer.
pub fn decode_fixed_int(input: &mut &[u8], width: usize) -> Result<i128, CodecError> {
    if width == 0 || width > 16 {
        return Err(CodecError::Invalid(format!("unsupported integer width {}", width)));
    }
    let bytes = take(input, width)?;
    let negative = bytes[width - 1] & 0x80 != 0;
    let mut full = if negative { [0xffu8; 16] } else { [0u8; 16] };
    full[..width].copy_from_slice(bytes);
    Ok(i128::from_le_bytes(full))
}

// ============================================================================
// Compact integers
// ============================================================================

/// Append a SCALE compact integer.
pub fn encode_compact(value: u128, out: &mut Vec<u8>) {
    Compact(value).encode_to(out);
}

/// Number of bytes a compact integer occupies, read from its first byte.
fn compact_encoded_len(first: u8) -> usize {
    match first & 0b11 {
        0b00 => 1,
        0b01 => 2,
        0b10 => 4,
        _ => (first >> 2) as usize + 4 + 1,
    }
}

/// Read a SCALE compact integer.
pub fn decode_compact(input: &mut &[u8]) -> Result<u128, CodecError> {
    let first = *input.first().ok_or(CodecError::TruncatedInput {
        needed: 1,
        available: 0,
    })?;
    let needed = compact_encoded_len(first);
    if input.len() < needed {
        return Err(CodecError::TruncatedInput {
            needed,
            available: input.len(),
        });
    }

    let mut cursor = *input;
    let value = Compact::<u128>::decode(&mut cursor)
        .map_err(|_| CodecError::InvalidCompact)?
        .0;
    *input = cursor;
    Ok(value)
}

/// Read a compact length prefix as `usize`.
pub fn decode_length(input: &mut &[u8]) -> Result<usize, CodecError> {
    let mut cursor = *input;
    let len = decode_compact(&mut cursor)?;
    let len = usize::try_from(len).map_err(|_| CodecError::InvalidCompact)?;
    *input = cursor;
    Ok(len)
}

// ============================================================================
// Bytes, strings, account ids
// ============================================================================

/// Append length-prefixed bytes.
pub fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    encode_compact(bytes.len() as u128, out);
    out.extend_from_slice(bytes);
}

/// Read length-prefixed bytes.
pub fn decode_bytes(input: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut cursor = *input;
    let len = decode_length(&mut cursor)?;
    let bytes = take(&mut cursor, len)?.to_vec();
    *input = cursor;
    Ok(bytes)
}

/// Append a length-prefixed UTF-8 string.
pub fn encode_str(s: &str, out: &mut Vec<u8>) {
    encode_bytes(s.as_bytes(), out);
}

/// Read a length-prefixed UTF-8 string.
pub fn decode_str(input: &mut &[u8]) -> Result<String, CodecError> {
    let mut cursor = *input;
    let bytes = decode_bytes(&mut cursor)?;
    let s = String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    *input = cursor;
    Ok(s)
}

/// Append an account id as its raw 32 bytes.
pub fn encode_account_id(account: &AccountId, out: &mut Vec<u8>) {
    out.extend_from_slice(account.as_bytes());
}

/// Read a raw 32-byte account id.
pub fn decode_account_id(input: &mut &[u8]) -> Result<AccountId, CodecError> {
    let bytes = take(input, 32)?;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(bytes);
    Ok(AccountId::from_bytes(arr))
}
