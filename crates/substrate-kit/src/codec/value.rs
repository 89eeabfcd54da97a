//! Typed value tree for call arguments and decoded data.

use std::fmt;

use primitive_types::U256;

use crate::error::CodecError;

/// Fields of a composite type or enum variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Composite {
    /// Fields addressed by name, in declaration order.
    Named(Vec<(String, Value)>),
    /// Positional fields (tuples and tuple structs).
    Unnamed(Vec<Value>),
}

impl Composite {
    /// A composite with no fields.
    pub fn empty() -> Self {
        Composite::Unnamed(Vec::new())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        match self {
            Composite::Named(fields) => fields.len(),
            Composite::Unnamed(fields) => fields.len(),
        }
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field values in order, dropping names.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Composite::Named(fields) => fields.iter().map(|(_, v)| v).collect(),
            Composite::Unnamed(fields) => fields.iter().collect(),
        }
    }

    /// Look up a named field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Composite::Named(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            Composite::Unnamed(_) => None,
        }
    }
}

/// A SCALE value whose shape is only known at runtime, from metadata.
///
/// Build values directly, or convert from JSON with [`Value::from_json`]:
///
/// ```
/// use substrate_kit::codec::Value;
/// use serde_json::json;
///
/// let args = Value::from_json(&json!({
///     "dest": { "Id": "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY" },
///     "value": "1000000000000",
/// })).unwrap();
/// assert_eq!(args.field("value").and_then(|v| v.as_u128()), Some(1_000_000_000_000));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    UInt(U256),
    Int(i128),
    Str(String),
    Bytes(Vec<u8>),
    Sequence(Vec<Value>),
    Composite(Composite),
    Variant { name: String, fields: Composite },
}

impl Value {
    /// Unsigned integer value.
    pub fn uint(n: impl Into<U256>) -> Self {
        Value::UInt(n.into())
    }

    /// Composite with named fields.
    pub fn named<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Composite(Composite::Named(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Composite with positional fields.
    pub fn unnamed(fields: impl IntoIterator<Item = Value>) -> Self {
        Value::Composite(Composite::Unnamed(fields.into_iter().collect()))
    }

    /// Enum variant with positional fields.
    pub fn variant(name: impl Into<String>, fields: impl IntoIterator<Item = Value>) -> Self {
        Value::Variant {
            name: name.into(),
            fields: Composite::Unnamed(fields.into_iter().collect()),
        }
    }

    /// Enum variant without fields.
    pub fn unit_variant(name: impl Into<String>) -> Self {
        Value::Variant {
            name: name.into(),
            fields: Composite::empty(),
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Composite(_) => "composite",
            Value::Variant { .. } => "variant",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as `u128`, if it is a non-negative integer that fits.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::UInt(n) if n.bits() <= 128 => Some(n.low_u128()),
            Value::Int(n) => u128::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Named field of a composite or variant.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Composite(c) => c.get(name),
            Value::Variant { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    /// Convert a JSON value.
    ///
    /// - numbers become `UInt`/`Int`; decimal strings become `UInt`
    /// - `0x` hex strings become `Bytes`; other strings stay `Str`
    /// - arrays become `Sequence`
    /// - single-key objects whose key starts with an uppercase letter become
    ///   enum variants (`{"Id": ...}`); other objects become named composites
    /// - `null` becomes an empty composite
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CodecError> {
        use serde_json::Value as J;

        Ok(match json {
            J::Null => Value::Composite(Composite::empty()),
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::UInt(U256::from(u))
                } else if let Some(i) = n.as_i64() {
                    Value::Int(i as i128)
                } else {
                    return Err(CodecError::Invalid(format!(
                        "non-integer number {} has no SCALE representation",
                        n
                    )));
                }
            }
            J::String(s) => string_value(s),
            J::Array(items) => Value::Sequence(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            J::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, inner)) = map.iter().next() {
                        if key.starts_with(|c: char| c.is_ascii_uppercase()) {
                            return Ok(Value::Variant {
                                name: key.clone(),
                                fields: variant_fields(inner)?,
                            });
                        }
                    }
                }
                Value::Composite(Composite::Named(
                    map.iter()
                        .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                        .collect::<Result<_, CodecError>>()?,
                ))
            }
        })
    }
}

fn string_value(s: &str) -> Value {
    if let Some(digits) = s.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(digits) {
            return Value::Bytes(bytes);
        }
    }
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = U256::from_dec_str(s) {
            return Value::UInt(n);
        }
    }
    Value::Str(s.to_string())
}

fn variant_fields(inner: &serde_json::Value) -> Result<Composite, CodecError> {
    Ok(match Value::from_json(inner)? {
        Value::Composite(c) => c,
        Value::Sequence(items) => Composite::Unnamed(items),
        other => Composite::Unnamed(vec![other]),
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Composite(c) => fmt_composite(c, f),
            Value::Variant { name, fields } => {
                f.write_str(name)?;
                if fields.is_empty() {
                    Ok(())
                } else {
                    fmt_composite(fields, f)
                }
            }
        }
    }
}

fn fmt_composite(c: &Composite, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match c {
        Composite::Named(fields) => {
            f.write_str("{ ")?;
            for (i, (name, value)) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            f.write_str(" }")
        }
        Composite::Unnamed(fields) => {
            f.write_str("(")?;
            for (i, value) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", value)?;
            }
            f.write_str(")")
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::UInt(U256::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt(U256::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(U256::from(n))
    }
}

impl From<u128> for Value {
    fn from(n: u128) -> Self {
        Value::UInt(U256::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<[u8; 32]> for Value {
    fn from(bytes: [u8; 32]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<crate::types::AccountId> for Value {
    fn from(account: crate::types::AccountId) -> Self {
        Value::Bytes(account.as_bytes().to_vec())
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = CodecError;

    fn try_from(json: &serde_json::Value) -> Result<Self, Self::Error> {
        Value::from_json(json)
    }
}
