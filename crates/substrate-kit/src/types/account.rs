//! Substrate account identifiers and SS58 addresses.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseAddressError;

use super::hash::blake2_512;

/// SS58 prefix of the generic Substrate network, used when no network is known.
pub const GENERIC_SS58_PREFIX: u16 = 42;

const SS58_CHECKSUM_PREAMBLE: &[u8] = b"SS58PRE";
const SS58_CHECKSUM_LEN: usize = 2;

/// A 32-byte Substrate account identifier.
///
/// The text form is SS58: base58 of `prefix ++ account ++ checksum`, where the
/// checksum is the first two bytes of
/// `blake2b_512("SS58PRE" ++ prefix ++ account)`. Parsing accepts any network
/// prefix, as well as a `0x`-prefixed 64-character hex string.
///
/// # Examples
///
/// ```
/// use substrate_kit::AccountId;
///
/// let alice: AccountId = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".parse().unwrap();
/// assert_eq!(alice.to_ss58(42), "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Create from raw 32 bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw 32 bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Format as SS58 with the given network prefix.
    pub fn to_ss58(&self, prefix: u16) -> String {
        let mut data = encode_ss58_prefix(prefix);
        data.extend_from_slice(&self.0);
        let checksum = ss58_checksum(&data);
        data.extend_from_slice(&checksum[..SS58_CHECKSUM_LEN]);
        bs58::encode(data).into_string()
    }

    /// Parse an SS58 string, returning the account and its network prefix.
    pub fn from_ss58(s: &str) -> Result<(Self, u16), ParseAddressError> {
        let data = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParseAddressError::InvalidBase58(e.to_string()))?;

        let (prefix, prefix_len) = decode_ss58_prefix(&data)?;
        if data.len() != prefix_len + 32 + SS58_CHECKSUM_LEN {
            return Err(ParseAddressError::InvalidLength(data.len()));
        }

        let body_len = prefix_len + 32;
        let checksum = ss58_checksum(&data[..body_len]);
        if data[body_len..] != checksum[..SS58_CHECKSUM_LEN] {
            return Err(ParseAddressError::InvalidChecksum);
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&data[prefix_len..body_len]);
        Ok((Self(bytes), prefix))
    }
}

fn ss58_checksum(data: &[u8]) -> [u8; 64] {
    let mut preimage = Vec::with_capacity(SS58_CHECKSUM_PREAMBLE.len() + data.len());
    preimage.extend_from_slice(SS58_CHECKSUM_PREAMBLE);
    preimage.extend_from_slice(data);
    blake2_512(&preimage)
}

/// Prefixes below 64 take one byte; 64..16384 take two.
fn encode_ss58_prefix(prefix: u16) -> Vec<u8> {
    let prefix = prefix & 0b0011_1111_1111_1111;
    if prefix < 64 {
        vec![prefix as u8]
    } else {
        let first = ((prefix & 0b0000_0000_1111_1100) as u8 >> 2) | 0b0100_0000;
        let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
        vec![first, second]
    }
}

fn decode_ss58_prefix(data: &[u8]) -> Result<(u16, usize), ParseAddressError> {
    match data.first() {
        None => Err(ParseAddressError::InvalidLength(0)),
        Some(&b) if b < 64 => Ok((b as u16, 1)),
        Some(&b) if b < 128 => {
            let second = *data
                .get(1)
                .ok_or(ParseAddressError::InvalidLength(data.len()))?;
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            Ok(((lower as u16) | ((upper as u16) << 8), 2))
        }
        Some(&b) => Err(ParseAddressError::InvalidPrefix(b as u16)),
    }
}

impl FromStr for AccountId {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix("0x") {
            let bytes =
                hex::decode(digits).map_err(|e| ParseAddressError::InvalidHex(e.to_string()))?;
            return Self::try_from(bytes.as_slice());
        }
        Ok(Self::from_ss58(s)?.0)
    }
}

impl TryFrom<&str> for AccountId {
    type Error = ParseAddressError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&[u8]> for AccountId {
    type Error = ParseAddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseAddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ss58(GENERIC_SS58_PREFIX))
    }
}

impl Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = serde::Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Address
// ============================================================================

/// The sender address placed in a signed extrinsic.
///
/// Most chains use `MultiAddress`, where `Id` is variant 0. EVM-flavoured
/// chains use 20-byte addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Id(AccountId),
    Address20([u8; 20]),
}

impl Address {
    /// Raw address bytes, without any enum tag.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Id(id) => id.as_bytes(),
            Address::Address20(bytes) => bytes,
        }
    }

    /// Name of the matching `MultiAddress` variant.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Address::Id(_) => "Id",
            Address::Address20(_) => "Address20",
        }
    }

    /// The account id, if this is a 32-byte account address.
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            Address::Id(id) => Some(id),
            Address::Address20(_) => None,
        }
    }
}

impl From<AccountId> for Address {
    fn from(id: AccountId) -> Self {
        Address::Id(id)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address::Address20(bytes)
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    /// Parses SS58 or 32-byte hex as `Id`, and 20-byte hex as `Address20`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix("0x") {
            if digits.len() == 40 {
                let bytes = hex::decode(digits)
                    .map_err(|e| ParseAddressError::InvalidHex(e.to_string()))?;
                let mut arr = [0u8; 20];
                arr.copy_from_slice(&bytes);
                return Ok(Address::Address20(arr));
            }
        }
        Ok(Address::Id(s.parse()?))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Id(id) => Display::fmt(id, f),
            Address::Address20(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}
