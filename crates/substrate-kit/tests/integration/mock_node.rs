//! In-process node double and signers shared by the integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use ::codec::Encode;
use frame_metadata::RuntimeMetadataPrefixed;
use frame_metadata::v14::{
    ExtrinsicMetadata, PalletCallMetadata, PalletMetadata, RuntimeMetadataV14,
    SignedExtensionMetadata,
};
use futures::StreamExt;
use futures::future::BoxFuture;
use scale_info::PortableRegistry;
use scale_info::form::PortableForm;
use serde_json::{Value as Json, json};
use substrate_kit::client::Subscription;
use substrate_kit::*;

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const ED25519_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

pub const GENESIS: [u8; 32] = [0x11; 32];
pub const FINALIZED: [u8; 32] = [0x22; 32];
pub const SPEC_VERSION: u32 = 9430;
pub const TX_VERSION: u32 = 24;

/// Route `tracing` output through the test harness; set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The fixture runtime's type table, pallets and signed extensions.
pub fn metadata_json() -> Json {
    serde_json::from_str(include_str!("fixtures/runtime_metadata.json")).unwrap()
}

/// Assemble a V14 metadata document from the fixture layout.
pub fn metadata_v14(json: &Json) -> RuntimeMetadataV14 {
    let types: PortableRegistry = serde_json::from_value(json["types"].clone()).unwrap();
    let id = |v: &Json| v.as_u64().unwrap() as u32;

    let pallets = json["pallets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| PalletMetadata::<PortableForm> {
            name: p["name"].as_str().unwrap().to_string(),
            storage: None,
            calls: p
                .get("calls")
                .map(|c| PalletCallMetadata { ty: id(&c["type"]).into() }),
            event: None,
            constants: vec![],
            error: None,
            index: p["index"].as_u64().unwrap() as u8,
        })
        .collect();

    let extrinsic = &json["extrinsic"];
    let signed_extensions = extrinsic["signedExtensions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| SignedExtensionMetadata::<PortableForm> {
            identifier: e["identifier"].as_str().unwrap().to_string(),
            ty: id(&e["type"]).into(),
            additional_signed: id(&e["additionalSigned"]).into(),
        })
        .collect();

    RuntimeMetadataV14 {
        types,
        pallets,
        extrinsic: ExtrinsicMetadata {
            ty: id(&extrinsic["type"]).into(),
            version: extrinsic["version"].as_u64().unwrap() as u8,
            signed_extensions,
        },
        ty: id(&extrinsic["type"]).into(),
    }
}

pub fn metadata() -> RuntimeMetadata {
    metadata_v14(&metadata_json()).try_into().unwrap()
}

/// What `state_getMetadata` returns for the fixture runtime.
pub fn metadata_hex() -> String {
    let blob = RuntimeMetadataPrefixed::from(metadata_v14(&metadata_json())).encode();
    format!("0x{}", hex::encode(blob))
}

pub fn context() -> RuntimeContext {
    RuntimeContext::new(
        SPEC_VERSION,
        TX_VERSION,
        H256::from_bytes(GENESIS),
        metadata(),
    )
}

pub fn alice() -> AccountId {
    ALICE.parse().unwrap()
}

pub fn transfer(value: u64) -> Call {
    Call::from_json(
        "Balances",
        "transfer",
        &json!({ "dest": { "Id": ALICE }, "value": value }),
    )
    .unwrap()
}

pub fn remark(bytes: &[u8]) -> Call {
    Call::new(
        "System",
        "remark",
        Value::named([("remark", Value::Bytes(bytes.to_vec()))]),
    )
}

// =============================================================================
// MockNode
// =============================================================================

/// A node that answers the pipeline's RPC methods from fixed data.
pub struct MockNode {
    pub nonce: u64,
    spec_version: AtomicU32,
    pub header_number: u64,
    pub statuses: Vec<Json>,
    failures: Mutex<HashMap<String, (i64, String)>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Vec<Json>)>>,
    unsubscribed: Arc<AtomicUsize>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            nonce: 3,
            spec_version: AtomicU32::new(SPEC_VERSION),
            header_number: 1000,
            statuses: vec![
                json!("ready"),
                json!({ "inBlock": format!("0x{}", "44".repeat(32)) }),
                json!({ "finalized": format!("0x{}", "44".repeat(32)) }),
            ],
            failures: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            unsubscribed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `method` with a JSON-RPC error.
    pub fn fail(self, method: &str, code: i64, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), (code, message.to_string()));
        self
    }

    /// Answer `method` only after `delay`.
    pub fn delay(self, method: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(method.to_string(), delay);
        self
    }

    /// Switch the node to another runtime.
    pub fn upgrade(&self, spec_version: u32) {
        self.spec_version.store(spec_version, Ordering::SeqCst);
    }

    pub fn with_statuses(mut self, statuses: Vec<Json>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    pub fn params_of(&self, method: &str) -> Option<Vec<Json>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    /// Hex extrinsic of the last submission or fee query.
    pub fn submitted_hex(&self, method: &str) -> Option<String> {
        self.params_of(method)
            .and_then(|p| p.first().and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn unsubscribed(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    fn answer(&self, method: &str) -> Result<Json, RpcError> {
        if let Some((code, message)) = self.failures.lock().unwrap().get(method) {
            return Err(RpcError::from_payload(*code, message.clone(), None));
        }
        match method {
            "system_accountNextIndex" => Ok(json!(self.nonce)),
            "chain_getFinalizedHead" => Ok(json!(H256::from_bytes(FINALIZED).to_string())),
            "chain_getHeader" => Ok(json!({
                "parentHash": format!("0x{}", "00".repeat(32)),
                "number": format!("0x{:x}", self.header_number),
                "stateRoot": format!("0x{}", "00".repeat(32)),
                "extrinsicsRoot": format!("0x{}", "00".repeat(32)),
                "digest": { "logs": [] }
            })),
            "chain_getBlockHash" => Ok(json!(H256::from_bytes(GENESIS).to_string())),
            "state_getRuntimeVersion" => Ok(json!({
                "specName": "node",
                "implName": "node",
                "specVersion": self.spec_version.load(Ordering::SeqCst),
                "implVersion": 0,
                "transactionVersion": TX_VERSION
            })),
            "state_getMetadata" => Ok(json!(metadata_hex())),
            "payment_queryInfo" => Ok(json!({
                "weight": { "refTime": 145_000_000u64, "proofSize": 3593 },
                "class": "normal",
                "partialFee": "15600000123"
            })),
            "author_submitExtrinsic" => Ok(json!(format!("0x{}", "33".repeat(32)))),
            other => Err(RpcError::from_payload(
                -32601,
                format!("Method not found: {}", other),
                None,
            )),
        }
    }

    fn delay_of(&self, method: &str) -> Option<Duration> {
        self.delays.lock().unwrap().get(method).copied()
    }
}

impl RpcEngine for MockNode {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Vec<Json>,
    ) -> BoxFuture<'a, Result<Json, RpcError>> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        Box::pin(async move {
            if let Some(delay) = self.delay_of(method) {
                tokio::time::sleep(delay).await;
            }
            self.answer(method)
        })
    }

    fn subscribe<'a>(
        &'a self,
        method: &'a str,
        params: Vec<Json>,
        _unsubscribe_method: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, RpcError>> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        Box::pin(async move {
            if let Some((code, message)) = self.failures.lock().unwrap().get(method) {
                return Err(RpcError::from_payload(*code, message.clone(), None));
            }
            let statuses: Vec<Result<Json, RpcError>> =
                self.statuses.iter().cloned().map(Ok).collect();
            let unsubscribed = self.unsubscribed.clone();
            Ok(
                Subscription::new("sub-1", futures::stream::iter(statuses).boxed()).on_drop(
                    move || {
                        unsubscribed.fetch_add(1, Ordering::SeqCst);
                    },
                ),
            )
        })
    }
}

// =============================================================================
// Signers
// =============================================================================

/// Signs with a fixed Ed25519 key on behalf of any account, counting calls.
pub struct CountingSigner {
    account_id: AccountId,
    key: SigningKey,
    pub signed: Arc<AtomicUsize>,
}

struct CountingBackend {
    secret_key: SecretKey,
    signed: Arc<AtomicUsize>,
}

impl SigningBackend for CountingBackend {
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, SignerError>> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        let signature = self.secret_key.sign(message);
        Box::pin(async move { signature })
    }
}

impl CountingSigner {
    pub fn new(account_id: AccountId) -> Self {
        let seed: [u8; 32] = hex::decode(ED25519_SEED).unwrap().try_into().unwrap();
        let secret_key = SecretKey::from_seed(CryptoType::Ed25519, seed);
        let signed = Arc::new(AtomicUsize::new(0));
        let key = SigningKey::from_backend(
            secret_key.public_key().unwrap(),
            Arc::new(CountingBackend {
                secret_key,
                signed: signed.clone(),
            }),
        );
        Self {
            account_id,
            key,
            signed,
        }
    }

    pub fn sign_count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

impl Signer for CountingSigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn crypto_type(&self) -> CryptoType {
        CryptoType::Ed25519
    }

    fn key(&self) -> SigningKey {
        self.key.clone()
    }
}

/// A service over `node` with the fixture runtime.
pub fn service(node: Arc<MockNode>) -> TransactionService {
    TransactionService::new(node, Arc::new(StaticRuntime(context())))
}
