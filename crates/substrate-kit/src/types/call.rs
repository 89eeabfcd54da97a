//! Logical chain calls.

use std::fmt;

use crate::codec::Value;
use crate::error::Error;
use crate::metadata::RuntimeMetadata;

/// One logical chain operation: a pallet function with its arguments.
///
/// Arguments are a [`Value`] whose shape is checked against runtime metadata
/// when the call is encoded.
///
/// # Example
///
/// ```
/// use substrate_kit::{Call, codec::Value};
/// use serde_json::json;
///
/// let call = Call::from_json("Balances", "transfer_keep_alive", &json!({
///     "dest": { "Id": "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY" },
///     "value": 1_000_000_000_000u64,
/// })).unwrap();
/// assert_eq!(call.to_string(), "Balances.transfer_keep_alive");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub pallet: String,
    pub function: String,
    pub args: Value,
}

impl Call {
    pub fn new(pallet: impl Into<String>, function: impl Into<String>, args: Value) -> Self {
        Self {
            pallet: pallet.into(),
            function: function.into(),
            args,
        }
    }

    /// Create a call with arguments given as JSON.
    pub fn from_json(
        pallet: impl Into<String>,
        function: impl Into<String>,
        args: &serde_json::Value,
    ) -> Result<Self, Error> {
        Ok(Self::new(pallet, function, Value::from_json(args)?))
    }

    /// SCALE-encode against the given metadata.
    pub fn encode(&self, metadata: &RuntimeMetadata) -> Result<Vec<u8>, Error> {
        metadata.encode_call(self)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pallet, self.function)
    }
}

/// A call as added to an extrinsic: either resolved against metadata at build
/// time, or already encoded by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallSource {
    Dynamic(Call),
    Raw(Vec<u8>),
}

impl CallSource {
    /// Encoded call bytes.
    pub fn encode(&self, metadata: &RuntimeMetadata) -> Result<Vec<u8>, Error> {
        match self {
            CallSource::Dynamic(call) => call.encode(metadata),
            CallSource::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<Call> for CallSource {
    fn from(call: Call) -> Self {
        CallSource::Dynamic(call)
    }
}
