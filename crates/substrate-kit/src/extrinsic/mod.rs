//! Extrinsic construction: signed-extension resolution, building, signing
//! and decoding.

mod builder;
mod decode;
mod extensions;

pub use builder::{
    EXTRINSIC_VERSION, Extrinsic, ExtrinsicBuilder, ExtrinsicSignature, MAX_UNHASHED_PAYLOAD,
    SIGNED_FLAG, SignedExtra,
};
pub use decode::{DecodedExtrinsic, DecodedSignature, decode_extrinsic};
pub use extensions::{
    ExtensionKind, ExtensionResolver, ResolvedExtension, ResolverStats, UnknownExtensionPolicy,
};
