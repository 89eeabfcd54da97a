//! Signed-extension resolution.
//!
//! A runtime declares its signed extensions by name, and names vary between
//! chains (`CheckMortality`, `frame_system::CheckMortality<Runtime>`,
//! `PrevalidateCheckMortality`, ...). The [`ExtensionResolver`] maps each
//! declared name onto the closed set of [`ExtensionKind`]s this crate knows
//! how to satisfy:
//!
//! 1. exact match against the canonical names and any registered overrides
//! 2. otherwise strip generic parameters, keep the last `::` segment and match
//!    canonical names as a suffix
//! 3. the result of step 2 is cached per [`ChainRevision`]
//!
//! Extensions that resolve to nothing contribute no additional signed data.
//! Whether that is acceptable is controlled by [`UnknownExtensionPolicy`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::metadata::{ChainRevision, RuntimeContext, SignedExtensionMetadata};
use crate::types::H256;

/// Signed-extension categories the builder can satisfy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    CheckGenesis,
    CheckMortality,
    CheckSpecVersion,
    CheckTxVersion,
    CheckNonce,
    CheckWeight,
    ChargeTransactionPayment,
}

impl ExtensionKind {
    pub const ALL: [ExtensionKind; 7] = [
        ExtensionKind::CheckGenesis,
        ExtensionKind::CheckMortality,
        ExtensionKind::CheckSpecVersion,
        ExtensionKind::CheckTxVersion,
        ExtensionKind::CheckNonce,
        ExtensionKind::CheckWeight,
        ExtensionKind::ChargeTransactionPayment,
    ];

    /// The identifier FRAME uses for this extension.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ExtensionKind::CheckGenesis => "CheckGenesis",
            ExtensionKind::CheckMortality => "CheckMortality",
            ExtensionKind::CheckSpecVersion => "CheckSpecVersion",
            ExtensionKind::CheckTxVersion => "CheckTxVersion",
            ExtensionKind::CheckNonce => "CheckNonce",
            ExtensionKind::CheckWeight => "CheckWeight",
            ExtensionKind::ChargeTransactionPayment => "ChargeTransactionPayment",
        }
    }

    /// Data this extension adds to the signing payload without putting it in
    /// the extrinsic.
    pub fn additional_signed(&self, ctx: &RuntimeContext, block_hash: H256, out: &mut Vec<u8>) {
        match self {
            ExtensionKind::CheckGenesis => out.extend_from_slice(ctx.genesis_hash.as_bytes()),
            ExtensionKind::CheckMortality => out.extend_from_slice(block_hash.as_bytes()),
            ExtensionKind::CheckSpecVersion => out.extend_from_slice(&ctx.spec_version.to_le_bytes()),
            ExtensionKind::CheckTxVersion => {
                out.extend_from_slice(&ctx.transaction_version.to_le_bytes())
            }
            ExtensionKind::CheckNonce
            | ExtensionKind::CheckWeight
            | ExtensionKind::ChargeTransactionPayment => {}
        }
    }
}

impl FromStr for ExtensionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtensionKind::ALL
            .into_iter()
            .find(|kind| kind.canonical_name() == s)
            .ok_or(())
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// What to do with a declared extension that resolves to no known kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownExtensionPolicy {
    /// Skip it: it contributes nothing to the payload.
    #[default]
    Skip,
    /// Fail with [`Error::UnsupportedSignedExtension`] if the extension
    /// carries data (explicit or additional). Extensions whose types are
    /// both empty are still skipped, since they contribute no bytes.
    Reject,
}

/// Counters for resolver activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Names resolved by exact match or override.
    pub exact_hits: u64,
    /// Names answered from the per-revision cache.
    pub cache_hits: u64,
    /// Names that needed the suffix search.
    pub suffix_searches: u64,
}

/// A declared extension paired with its resolved kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedExtension {
    pub identifier: String,
    pub kind: Option<ExtensionKind>,
}

/// Maps declared signed-extension names onto [`ExtensionKind`]s.
///
/// The resolver owns its cache; construct one per chain session (the
/// [`Substrate`](crate::Substrate) client holds one) and share it by
/// reference.
#[derive(Default)]
pub struct ExtensionResolver {
    overrides: HashMap<String, ExtensionKind>,
    policy: UnknownExtensionPolicy,
    cache: Mutex<HashMap<ChainRevision, HashMap<String, Option<ExtensionKind>>>>,
    exact_hits: AtomicU64,
    cache_hits: AtomicU64,
    suffix_searches: AtomicU64,
}

impl ExtensionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `identifier` as `kind` on every chain.
    pub fn with_override(mut self, identifier: impl Into<String>, kind: ExtensionKind) -> Self {
        self.overrides.insert(identifier.into(), kind);
        self
    }

    pub fn with_policy(mut self, policy: UnknownExtensionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnknownExtensionPolicy {
        self.policy
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            suffix_searches: self.suffix_searches.load(Ordering::Relaxed),
        }
    }

    /// Resolve one declared identifier for the given chain revision.
    pub fn resolve(&self, revision: ChainRevision, identifier: &str) -> Option<ExtensionKind> {
        if let Some(kind) = self.exact(identifier) {
            self.exact_hits.fetch_add(1, Ordering::Relaxed);
            return Some(kind);
        }

        // Held across the search so concurrent callers see one search per name.
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let names = cache.entry(revision).or_default();
        if let Some(found) = names.get(identifier) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return *found;
        }

        self.suffix_searches.fetch_add(1, Ordering::Relaxed);
        let found = self.suffix_search(identifier);
        match found {
            Some(kind) => tracing::debug!(identifier, %kind, %revision, "resolved signed extension by suffix"),
            None => tracing::warn!(identifier, %revision, "unknown signed extension"),
        }
        names.insert(identifier.to_string(), found);
        found
    }

    /// Resolve every extension the runtime declares, in declared order,
    /// applying the unknown-extension policy.
    pub fn resolve_all(&self, ctx: &RuntimeContext) -> Result<Vec<ResolvedExtension>, Error> {
        let revision = ctx.revision();
        ctx.metadata
            .extrinsic
            .signed_extensions
            .iter()
            .map(|ext| {
                let kind = self.resolve(revision, &ext.identifier);
                if kind.is_none() && self.policy == UnknownExtensionPolicy::Reject {
                    self.check_rejectable(ctx, ext)?;
                }
                Ok(ResolvedExtension {
                    identifier: ext.identifier.clone(),
                    kind,
                })
            })
            .collect()
    }

    /// Additional signed data for all declared extensions, in declared order.
    ///
    /// `block_hash` is the checkpoint of the extrinsic's era (the genesis
    /// hash for immortal extrinsics).
    pub fn additional_signed(
        &self,
        ctx: &RuntimeContext,
        block_hash: H256,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        for ext in self.resolve_all(ctx)? {
            if let Some(kind) = ext.kind {
                kind.additional_signed(ctx, block_hash, out);
            }
        }
        Ok(())
    }

    fn exact(&self, identifier: &str) -> Option<ExtensionKind> {
        self.overrides
            .get(identifier)
            .copied()
            .or_else(|| identifier.parse().ok())
    }

    fn suffix_search(&self, identifier: &str) -> Option<ExtensionKind> {
        let base = strip_path(identifier);
        if let Some(kind) = self.exact(base) {
            return Some(kind);
        }
        if let Some((_, kind)) = self.overrides.iter().find(|(name, _)| base.ends_with(name.as_str())) {
            return Some(*kind);
        }
        ExtensionKind::ALL
            .into_iter()
            .find(|kind| base.ends_with(kind.canonical_name()))
    }

    fn check_rejectable(&self, ctx: &RuntimeContext, ext: &SignedExtensionMetadata) -> Result<(), Error> {
        let metadata = &ctx.metadata;
        if metadata.is_empty_type(ext.ty.id) && metadata.is_empty_type(ext.additional_signed.id) {
            return Ok(());
        }
        Err(Error::UnsupportedSignedExtension(ext.identifier.clone()))
    }
}

impl fmt::Debug for ExtensionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionResolver")
            .field("overrides", &self.overrides)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

/// `a::b::CheckNonce<T>` -> `CheckNonce`
fn strip_path(identifier: &str) -> &str {
    let without_generics = match identifier.find('<') {
        Some(pos) => &identifier[..pos],
        None => identifier,
    };
    let trimmed = without_generics.trim();
    match trimmed.rfind("::") {
        Some(pos) => &trimmed[pos + 2..],
        None => trimmed,
    }
}
