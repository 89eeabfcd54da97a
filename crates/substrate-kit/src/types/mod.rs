//! Core types for Substrate chains.

mod account;
mod call;
mod era;
mod hash;
mod key;
mod network;
mod rpc;

pub use account::{AccountId, Address, GENERIC_SS58_PREFIX};
pub use call::{Call, CallSource};
pub use era::{Era, MORTAL_PERIOD};
pub use hash::{H256, blake2_256, blake2_512};
pub use key::{CryptoType, PublicKey, SecretKey};
pub use network::Network;
pub use rpc::{
    Digest, DispatchClass, ExtrinsicStatus, FeeInfo, Header, RuntimeVersion, Weight,
};
