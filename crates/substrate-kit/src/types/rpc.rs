//! RPC response types.

use serde::{Deserialize, Deserializer, Serialize};

use super::hash::H256;

// ============================================================================
// Number helpers
// ============================================================================

/// Deserialize an integer sent either as a JSON number, a decimal string, or
/// a `0x`-prefixed hex string.
fn de_flexible_u128<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n as u128),
        Raw::Str(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                u128::from_str_radix(hex, 16).map_err(serde::de::Error::custom)
            } else {
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    }
}

fn de_flexible_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let n = de_flexible_u128(d)?;
    u64::try_from(n).map_err(serde::de::Error::custom)
}

// ============================================================================
// Block types
// ============================================================================

/// Block header from `chain_getHeader`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Parent block hash.
    pub parent_hash: H256,
    /// Block number (sent as hex by the node).
    #[serde(deserialize_with = "de_flexible_u64")]
    pub number: u64,
    /// State trie root.
    pub state_root: H256,
    /// Extrinsics trie root.
    pub extrinsics_root: H256,
    /// Digest logs, kept as raw hex.
    #[serde(default)]
    pub digest: Digest,
}

/// Header digest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Digest {
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Runtime version from `state_getRuntimeVersion`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_name: String,
    #[serde(default)]
    pub impl_name: String,
    pub spec_version: u32,
    #[serde(default)]
    pub impl_version: u32,
    pub transaction_version: u32,
}

// ============================================================================
// Fee types
// ============================================================================

/// Dispatch weight. Older runtimes report a single number, newer ones report
/// reference time and proof size separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
    pub ref_time: u64,
    pub proof_size: u64,
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            V1(u64),
            #[serde(rename_all = "camelCase")]
            V2 {
                ref_time: u64,
                #[serde(default)]
                proof_size: u64,
            },
        }

        Ok(match Raw::deserialize(d)? {
            Raw::V1(ref_time) => Weight {
                ref_time,
                proof_size: 0,
            },
            Raw::V2 {
                ref_time,
                proof_size,
            } => Weight {
                ref_time,
                proof_size,
            },
        })
    }
}

/// Dispatch class of an extrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchClass {
    Normal,
    Operational,
    Mandatory,
}

/// Fee estimate from `payment_queryInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeInfo {
    /// Weight the extrinsic will consume.
    pub weight: Weight,
    /// Dispatch class.
    pub class: DispatchClass,
    /// Estimated fee, excluding tip, in the chain's smallest unit.
    #[serde(deserialize_with = "de_flexible_u128")]
    pub partial_fee: u128,
}

// ============================================================================
// Submission status
// ============================================================================

/// Status update from `author_submitAndWatchExtrinsic`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtrinsicStatus {
    /// In the pool, waiting for a dependency (usually an earlier nonce).
    Future,
    /// In the pool, ready to be included.
    Ready,
    /// Gossiped to the listed peers.
    Broadcast(Vec<String>),
    /// Included in a block.
    InBlock(H256),
    /// The including block was retracted.
    Retracted(H256),
    /// Finality was not reached within the node's timeout.
    FinalityTimeout(H256),
    /// Included in a finalized block.
    Finalized(H256),
    /// Replaced by another extrinsic with the same nonce.
    Usurped(H256),
    /// Dropped from the pool.
    Dropped,
    /// Rejected as invalid.
    Invalid,
}

impl ExtrinsicStatus {
    /// Whether no further updates will follow this one.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ExtrinsicStatus::Finalized(_)
                | ExtrinsicStatus::FinalityTimeout(_)
                | ExtrinsicStatus::Usurped(_)
                | ExtrinsicStatus::Dropped
                | ExtrinsicStatus::Invalid
        )
    }

    /// The block the extrinsic was included in, if any.
    pub fn block_hash(&self) -> Option<H256> {
        match self {
            ExtrinsicStatus::InBlock(h) | ExtrinsicStatus::Finalized(h) => Some(*h),
            _ => None,
        }
    }
}
