//! Metadata-driven encoding and decoding of [`Value`]s.

use primitive_types::U256;

use scale_info::form::PortableForm;
use scale_info::{PortableRegistry, TypeDef, TypeDefPrimitive, TypeDefVariant};

use crate::error::CodecError;
use crate::types::AccountId;

use super::value::{Composite, Value};
use super::{
    decode_bytes, decode_compact, decode_fixed_int, decode_fixed_uint, decode_length, decode_str,
    encode_bytes, encode_compact, encode_fixed_int, encode_fixed_uint, encode_str, take,
};

type TypeInfo = scale_info::Type<PortableForm>;
type Field = scale_info::Field<PortableForm>;
type Variant = scale_info::Variant<PortableForm>;

/// Encode `value` as the registry type `type_id`, appending to `out`.
///
/// The encoder accepts a few convenient shapes besides the exact one:
///
/// - `Bytes` or `Str` for `Vec<u8>` and `[u8; N]`; an SS58 `Str` for 32-byte
///   arrays
/// - a bare value for any single-field composite or single-element tuple
/// - a bare value for an enum with an `Id` variant (`MultiAddress`)
/// - a `Str` naming a field-less variant
///
/// On error, `out` may contain a partial encoding.
pub fn encode_value(
    registry: &PortableRegistry,
    type_id: u32,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let ty = resolve(registry, type_id)?;
    match &ty.type_def {
        TypeDef::Primitive(p) => encode_primitive(p, value, out),
        TypeDef::Compact(inner) => encode_compact_value(registry, inner.type_param.id, value, out),
        TypeDef::Sequence(elem) => {
            let elem = elem.type_param.id;
            if is_u8(registry, elem) {
                if let Some(bytes) = byte_like(value) {
                    encode_bytes(&bytes, out);
                    return Ok(());
                }
            }
            let items = sequence_items(value).ok_or_else(|| mismatch(ty, value))?;
            encode_compact(items.len() as u128, out);
            for item in items {
                encode_value(registry, elem, item, out)?;
            }
            Ok(())
        }
        TypeDef::Array(array) => {
            let (len, elem) = (array.len as usize, array.type_param.id);
            if is_u8(registry, elem) {
                let bytes = match value {
                    Value::Str(s) if len == 32 && !s.starts_with("0x") => s
                        .parse::<AccountId>()
                        .map(|a| a.as_bytes().to_vec())
                        .map_err(|e| CodecError::Invalid(e.to_string()))?,
                    _ => match byte_like(value) {
                        Some(bytes) => bytes,
                        None => return encode_array_items(registry, ty, elem, len, value, out),
                    },
                };
                if bytes.len() != len {
                    return Err(CodecError::Invalid(format!(
                        "expected {} bytes, got {}",
                        len,
                        bytes.len()
                    )));
                }
                out.extend_from_slice(&bytes);
                return Ok(());
            }
            encode_array_items(registry, ty, elem, len, value, out)
        }
        TypeDef::Tuple(tuple) => {
            let ids: Vec<u32> = tuple.fields.iter().map(|t| t.id).collect();
            if ids.is_empty() {
                return Ok(());
            }
            match value {
                Value::Sequence(items) if ids.len() > 1 || items.len() == 1 => {
                    encode_positional(registry, ty, &ids, &items.iter().collect::<Vec<_>>(), value, out)
                }
                Value::Composite(c) => encode_positional(registry, ty, &ids, &c.values(), value, out),
                _ if ids.len() == 1 => encode_value(registry, ids[0], value, out),
                _ => Err(mismatch(ty, value)),
            }
        }
        TypeDef::Composite(composite) => encode_fields(registry, ty, &composite.fields, value, out),
        TypeDef::Variant(variants) => {
            let (name, fields) = match value {
                Value::Variant { name, fields } => (name.as_str(), fields.clone()),
                Value::Str(s) if by_name(variants, s).is_some_and(|v| v.fields.is_empty()) => {
                    (s.as_str(), Composite::empty())
                }
                Value::Str(_) | Value::Bytes(_) if by_name(variants, "Id").is_some() => {
                    ("Id", Composite::Unnamed(vec![value.clone()]))
                }
                _ => return Err(mismatch(ty, value)),
            };
            let variant = by_name(variants, name).ok_or_else(|| CodecError::UnknownVariant {
                type_name: type_name(ty),
                name: name.to_string(),
            })?;
            out.push(variant.index);
            encode_fields(
                registry,
                ty,
                &variant.fields,
                &Value::Composite(fields),
                out,
            )
        }
        TypeDef::BitSequence(_) => Err(CodecError::Invalid(
            "bit sequences are not supported".to_string(),
        )),
    }
}

/// Decode one value of registry type `type_id` from the front of `input`.
///
/// The input is only advanced when decoding succeeds.
pub fn decode_value(
    registry: &PortableRegistry,
    type_id: u32,
    input: &mut &[u8],
) -> Result<Value, CodecError> {
    let mut cursor = *input;
    let value = decode_inner(registry, type_id, &mut cursor)?;
    *input = cursor;
    Ok(value)
}

/// Decode the fields of a composite or variant.
pub(crate) fn decode_fields(
    registry: &PortableRegistry,
    fields: &[Field],
    input: &mut &[u8],
) -> Result<Composite, CodecError> {
    let named = !fields.is_empty() && fields.iter().all(|f| f.name.is_some());
    if named {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let value = decode_inner(registry, field.ty.id, input)?;
            out.push((field.name.clone().unwrap_or_default(), value));
        }
        Ok(Composite::Named(out))
    } else {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            out.push(decode_inner(registry, field.ty.id, input)?);
        }
        Ok(Composite::Unnamed(out))
    }
}

/// Encode `value` as the fields of a composite or variant.
pub(crate) fn encode_fields(
    registry: &PortableRegistry,
    ty: &TypeInfo,
    fields: &[Field],
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    if fields.is_empty() {
        return match value {
            Value::Composite(c) if c.is_empty() => Ok(()),
            Value::Sequence(items) if items.is_empty() => Ok(()),
            _ => Err(mismatch(ty, value)),
        };
    }

    let all_named = fields.iter().all(|f| f.name.is_some());
    match value {
        Value::Composite(Composite::Named(pairs)) if all_named => {
            let single_passthrough = fields.len() == 1
                && fields[0]
                    .name
                    .as_deref()
                    .is_some_and(|n| !pairs.iter().any(|(k, _)| k == n));
            if single_passthrough {
                return encode_value(registry, fields[0].ty.id, value, out);
            }
            for field in fields {
                let name = field.name.as_deref().unwrap_or_default();
                let (_, field_value) = pairs
                    .iter()
                    .find(|(k, _)| k == name)
                    .ok_or_else(|| CodecError::MissingField(name.to_string()))?;
                encode_value(registry, field.ty.id, field_value, out)?;
            }
            Ok(())
        }
        Value::Composite(c) if c.len() == fields.len() => {
            for (field, field_value) in fields.iter().zip(c.values()) {
                encode_value(registry, field.ty.id, field_value, out)?;
            }
            Ok(())
        }
        Value::Sequence(items) if fields.len() > 1 && items.len() == fields.len() => {
            for (field, field_value) in fields.iter().zip(items) {
                encode_value(registry, field.ty.id, field_value, out)?;
            }
            Ok(())
        }
        _ if fields.len() == 1 => encode_value(registry, fields[0].ty.id, value, out),
        _ => Err(mismatch(ty, value)),
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn resolve(registry: &PortableRegistry, type_id: u32) -> Result<&TypeInfo, CodecError> {
    registry
        .resolve(type_id)
        .ok_or(CodecError::UnknownType(type_id))
}

/// `a::b::Name` for path-carrying types, the shape otherwise.
fn type_name(ty: &TypeInfo) -> String {
    if !ty.path.segments.is_empty() {
        return ty.path.segments.join("::");
    }
    match &ty.type_def {
        TypeDef::Primitive(p) => primitive_name(p).to_string(),
        TypeDef::Compact(_) => "compact".to_string(),
        TypeDef::Sequence(_) => "sequence".to_string(),
        TypeDef::Array(a) => format!("[_; {}]", a.len),
        TypeDef::Tuple(_) => "tuple".to_string(),
        TypeDef::Composite(_) => "composite".to_string(),
        TypeDef::Variant(_) => "enum".to_string(),
        TypeDef::BitSequence(_) => "bitvec".to_string(),
    }
}

fn mismatch(ty: &TypeInfo, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: type_name(ty),
        actual: value.kind().to_string(),
    }
}

fn by_name<'a>(variants: &'a TypeDefVariant<PortableForm>, name: &str) -> Option<&'a Variant> {
    variants.variants.iter().find(|v| v.name == name)
}

fn by_index(variants: &TypeDefVariant<PortableForm>, index: u8) -> Option<&Variant> {
    variants.variants.iter().find(|v| v.index == index)
}

fn primitive_name(p: &TypeDefPrimitive) -> &'static str {
    match p {
        TypeDefPrimitive::Bool => "bool",
        TypeDefPrimitive::Char => "char",
        TypeDefPrimitive::Str => "str",
        TypeDefPrimitive::U8 => "u8",
        TypeDefPrimitive::U16 => "u16",
        TypeDefPrimitive::U32 => "u32",
        TypeDefPrimitive::U64 => "u64",
        TypeDefPrimitive::U128 => "u128",
        TypeDefPrimitive::U256 => "u256",
        TypeDefPrimitive::I8 => "i8",
        TypeDefPrimitive::I16 => "i16",
        TypeDefPrimitive::I32 => "i32",
        TypeDefPrimitive::I64 => "i64",
        TypeDefPrimitive::I128 => "i128",
        TypeDefPrimitive::I256 => "i256",
    }
}

/// Byte width of an unsigned primitive.
fn uint_width(p: &TypeDefPrimitive) -> Option<usize> {
    match p {
        TypeDefPrimitive::U8 => Some(1),
        TypeDefPrimitive::U16 => Some(2),
        TypeDefPrimitive::U32 => Some(4),
        TypeDefPrimitive::U64 => Some(8),
        TypeDefPrimitive::U128 => Some(16),
        TypeDefPrimitive::U256 => Some(32),
        _ => None,
    }
}

/// Byte width of a signed primitive.
fn int_width(p: &TypeDefPrimitive) -> Option<usize> {
    match p {
        TypeDefPrimitive::I8 => Some(1),
        TypeDefPrimitive::I16 => Some(2),
        TypeDefPrimitive::I32 => Some(4),
        TypeDefPrimitive::I64 => Some(8),
        TypeDefPrimitive::I128 => Some(16),
        TypeDefPrimitive::I256 => Some(32),
        _ => None,
    }
}

fn is_u8(registry: &PortableRegistry, type_id: u32) -> bool {
    matches!(
        registry.resolve(type_id).map(|t| &t.type_def),
        Some(TypeDef::Primitive(TypeDefPrimitive::U8))
    )
}

fn byte_like(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(b) => Some(b.clone()),
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

fn sequence_items(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Sequence(items) => Some(items.iter().collect()),
        Value::Composite(Composite::Unnamed(items)) => Some(items.iter().collect()),
        _ => None,
    }
}

fn encode_array_items(
    registry: &PortableRegistry,
    ty: &TypeInfo,
    elem: u32,
    len: usize,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let items = sequence_items(value).ok_or_else(|| mismatch(ty, value))?;
    if items.len() != len {
        return Err(CodecError::Invalid(format!(
            "expected {} array items, got {}",
            len,
            items.len()
        )));
    }
    for item in items {
        encode_value(registry, elem, item, out)?;
    }
    Ok(())
}

fn encode_positional(
    registry: &PortableRegistry,
    ty: &TypeInfo,
    ids: &[u32],
    items: &[&Value],
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    if items.len() != ids.len() {
        return Err(mismatch(ty, value));
    }
    for (id, item) in ids.iter().zip(items) {
        encode_value(registry, *id, item, out)?;
    }
    Ok(())
}

fn encode_primitive(
    p: &TypeDefPrimitive,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let type_mismatch = || CodecError::TypeMismatch {
        expected: primitive_name(p).to_string(),
        actual: value.kind().to_string(),
    };

    if let Some(width) = uint_width(p) {
        let n = match value {
            Value::UInt(n) => *n,
            Value::Int(n) if *n >= 0 => U256::from(*n as u128),
            Value::Int(_) => return Err(CodecError::Overflow { width }),
            _ => return Err(type_mismatch()),
        };
        return encode_fixed_uint(n, width, out);
    }

    if let Some(width) = int_width(p) {
        if width > 16 {
            return Err(CodecError::Invalid("i256 is not supported".to_string()));
        }
        let n = match value {
            Value::Int(n) => *n,
            Value::UInt(n) if n.bits() < 128 => n.low_u128() as i128,
            Value::UInt(_) => return Err(CodecError::Overflow { width }),
            _ => return Err(type_mismatch()),
        };
        return encode_fixed_int(n, width, out);
    }

    match (p, value) {
        (TypeDefPrimitive::Bool, Value::Bool(b)) => {
            out.push(u8::from(*b));
            Ok(())
        }
        (TypeDefPrimitive::Str, Value::Str(s)) => {
            encode_str(s, out);
            Ok(())
        }
        (TypeDefPrimitive::Char, Value::Str(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    out.extend_from_slice(&(c as u32).to_le_bytes());
                    Ok(())
                }
                _ => Err(CodecError::Invalid(format!("'{}' is not a single char", s))),
            }
        }
        _ => Err(type_mismatch()),
    }
}

fn encode_compact_value(
    registry: &PortableRegistry,
    inner: u32,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let n = match value {
        Value::UInt(n) if n.bits() <= 128 => n.low_u128(),
        Value::UInt(_) => return Err(CodecError::Overflow { width: 16 }),
        Value::Int(n) if *n >= 0 => *n as u128,
        // Compact<Wrapper(u32)> and similar single-field wrappers.
        Value::Composite(c) if c.len() == 1 => {
            let values = c.values();
            return encode_compact_value(registry, inner, values[0], out);
        }
        _ => {
            return Err(CodecError::TypeMismatch {
                expected: "compact".to_string(),
                actual: value.kind().to_string(),
            });
        }
    };
    encode_compact(n, out);
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_inner(
    registry: &PortableRegistry,
    type_id: u32,
    input: &mut &[u8],
) -> Result<Value, CodecError> {
    let ty = resolve(registry, type_id)?;
    match &ty.type_def {
        TypeDef::Primitive(p) => decode_primitive(p, input),
        TypeDef::Compact(_) => Ok(Value::UInt(U256::from(decode_compact(input)?))),
        TypeDef::Sequence(elem) => {
            let elem = elem.type_param.id;
            if is_u8(registry, elem) {
                return Ok(Value::Bytes(decode_bytes(input)?));
            }
            let len = decode_length(input)?;
            let mut items = Vec::with_capacity(len.min(input.len()));
            for _ in 0..len {
                items.push(decode_inner(registry, elem, input)?);
            }
            Ok(Value::Sequence(items))
        }
        TypeDef::Array(array) => {
            let (len, elem) = (array.len as usize, array.type_param.id);
            if is_u8(registry, elem) {
                return Ok(Value::Bytes(take(input, len)?.to_vec()));
            }
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(decode_inner(registry, elem, input)?);
            }
            Ok(Value::Sequence(items))
        }
        TypeDef::Tuple(tuple) => {
            let mut items = Vec::with_capacity(tuple.fields.len());
            for elem in &tuple.fields {
                items.push(decode_inner(registry, elem.id, input)?);
            }
            Ok(Value::Composite(Composite::Unnamed(items)))
        }
        TypeDef::Composite(composite) => Ok(Value::Composite(decode_fields(
            registry,
            &composite.fields,
            input,
        )?)),
        TypeDef::Variant(variants) => {
            let index = take(input, 1)?[0];
            let variant = by_index(variants, index).ok_or_else(|| {
                CodecError::UnknownVariantIndex {
                    type_name: type_name(ty),
                    index,
                }
            })?;
            let fields = decode_fields(registry, &variant.fields, input)?;
            Ok(Value::Variant {
                name: variant.name.clone(),
                fields,
            })
        }
        TypeDef::BitSequence(_) => Err(CodecError::Invalid(
            "bit sequences are not supported".to_string(),
        )),
    }
}

fn decode_primitive(p: &TypeDefPrimitive, input: &mut &[u8]) -> Result<Value, CodecError> {
    if let Some(width) = uint_width(p) {
        return Ok(Value::UInt(decode_fixed_uint(input, width)?));
    }
    if let Some(width) = int_width(p) {
        if width > 16 {
            return Err(CodecError::Invalid("i256 is not supported".to_string()));
        }
        return Ok(Value::Int(decode_fixed_int(input, width)?));
    }
    match p {
        TypeDefPrimitive::Bool => match take(input, 1)?[0] {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            b => Err(CodecError::Invalid(format!("invalid bool byte {}", b))),
        },
        TypeDefPrimitive::Str => Ok(Value::Str(decode_str(input)?)),
        TypeDefPrimitive::Char => {
            let bytes = take(input, 4)?;
            let code = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let c = char::from_u32(code)
                .ok_or_else(|| CodecError::Invalid(format!("invalid char {}", code)))?;
            Ok(Value::Str(c.to_string()))
        }
        _ => Err(CodecError::Invalid(format!("unsupported primitive {}", primitive_name(p)))),
    }
}
