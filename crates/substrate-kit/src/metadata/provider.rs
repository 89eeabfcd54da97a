//! Sources of the current runtime coding context.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use super::RuntimeMetadata;
use crate::client::{RpcEngine, request_as};
use crate::error::Error;
use crate::types::{H256, RuntimeVersion};

/// Identifies one runtime of one chain.
///
/// A runtime upgrade bumps the spec version; different chains differ by
/// genesis hash. Anything derived from metadata can be cached under this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainRevision {
    pub genesis_hash: H256,
    pub spec_version: u32,
}

impl fmt::Display for ChainRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.genesis_hash, self.spec_version)
    }
}

/// Everything needed to encode and sign an extrinsic for the current runtime.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: H256,
    pub metadata: Arc<RuntimeMetadata>,
}

impl RuntimeContext {
    pub fn new(
        spec_version: u32,
        transaction_version: u32,
        genesis_hash: H256,
        metadata: impl Into<Arc<RuntimeMetadata>>,
    ) -> Self {
        Self {
            spec_version,
            transaction_version,
            genesis_hash,
            metadata: metadata.into(),
        }
    }

    pub fn revision(&self) -> ChainRevision {
        ChainRevision {
            genesis_hash: self.genesis_hash,
            spec_version: self.spec_version,
        }
    }
}

/// Yields the runtime context the chain is running right now.
///
/// The transaction service calls [`fetch_current`](Self::fetch_current) once
/// per request and never reuses the result for another request.
pub trait RuntimeProvider: Send + Sync {
    fn fetch_current(&self) -> BoxFuture<'_, Result<RuntimeContext, Error>>;
}

/// A provider that always returns the same context.
///
/// Useful for tests and for offline signing against a known runtime.
#[derive(Debug, Clone)]
pub struct StaticRuntime(pub RuntimeContext);

impl RuntimeProvider for StaticRuntime {
    fn fetch_current(&self) -> BoxFuture<'_, Result<RuntimeContext, Error>> {
        let ctx = self.0.clone();
        Box::pin(async move { Ok(ctx) })
    }
}

/// Reads versions and genesis hash from the node on every fetch and pairs
/// them with the metadata of that spec version.
///
/// Metadata is cached per spec version. The first fetch that sees a new spec
/// version, at startup or after a runtime upgrade, downloads it with
/// `state_getMetadata`. Metadata can also be preloaded with
/// [`with_metadata`](Self::with_metadata).
pub struct RpcRuntimeProvider {
    rpc: Arc<dyn RpcEngine>,
    metadata: RwLock<HashMap<u32, Arc<RuntimeMetadata>>>,
}

impl RpcRuntimeProvider {
    pub fn new(rpc: Arc<dyn RpcEngine>) -> Self {
        Self {
            rpc,
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Preload metadata for a spec version.
    pub fn with_metadata(self, spec_version: u32, metadata: impl Into<Arc<RuntimeMetadata>>) -> Self {
        self.insert_metadata(spec_version, metadata);
        self
    }

    /// Register metadata after construction, e.g. after a runtime upgrade.
    pub fn insert_metadata(&self, spec_version: u32, metadata: impl Into<Arc<RuntimeMetadata>>) {
        let mut map = self.metadata.write().unwrap_or_else(|e| e.into_inner());
        map.insert(spec_version, metadata.into());
    }

    async fn fetch(&self) -> Result<RuntimeContext, Error> {
        let (version, genesis_hash) = futures::try_join!(
            request_as::<RuntimeVersion>(self.rpc.as_ref(), "state_getRuntimeVersion", vec![]),
            request_as::<H256>(
                self.rpc.as_ref(),
                "chain_getBlockHash",
                vec![serde_json::json!(0)]
            ),
        )?;

        let cached = {
            let map = self.metadata.read().unwrap_or_else(|e| e.into_inner());
            map.get(&version.spec_version).cloned()
        };
        let metadata = match cached {
            Some(metadata) => metadata,
            None => self.download_metadata(&version).await?,
        };

        tracing::debug!(
            spec_version = version.spec_version,
            transaction_version = version.transaction_version,
            %genesis_hash,
            "fetched runtime context"
        );

        Ok(RuntimeContext {
            spec_version: version.spec_version,
            transaction_version: version.transaction_version,
            genesis_hash,
            metadata,
        })
    }
}

impl RpcRuntimeProvider {
    async fn download_metadata(&self, version: &RuntimeVersion) -> Result<Arc<RuntimeMetadata>, Error> {
        let blob: String = request_as(self.rpc.as_ref(), "state_getMetadata", vec![]).await?;
        let metadata = Arc::new(RuntimeMetadata::from_hex(&blob)?);
        tracing::info!(
            spec_name = %version.spec_name,
            spec_version = version.spec_version,
            pallets = metadata.pallets.len(),
            "loaded runtime metadata"
        );
        self.insert_metadata(version.spec_version, metadata.clone());
        Ok(metadata)
    }
}

impl RuntimeProvider for RpcRuntimeProvider {
    fn fetch_current(&self) -> BoxFuture<'_, Result<RuntimeContext, Error>> {
        Box::pin(self.fetch())
    }
}

impl fmt::Debug for RpcRuntimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<u32> = self
            .metadata
            .read()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("RpcRuntimeProvider")
            .field("spec_versions", &versions)
            .finish()
    }
}
