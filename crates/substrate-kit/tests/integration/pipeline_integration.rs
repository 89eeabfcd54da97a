//! End-to-end runs of the transaction pipeline against [`MockNode`].

use std::sync::Arc;

use serde_json::json;
use substrate_kit::*;
use tokio_util::sync::CancellationToken;

use crate::mock_node::*;

/// Hex of the extrinsic built from the golden inputs: Alice as sender,
/// nonce 3, era from block 1000, one transfer of 1000.
const GOLDEN_EXTRINSIC: &str = "31028400d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d003ec553c70ba27917b1504d45373d609d74764217b55444679fd2ad4d4c2124b7cc3093d34743486cd5ebf2fb77300fc01d9c0f79114ec870a53d05baacec380b85020c00040000d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27da10f";

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_produces_golden_extrinsic() {
    init_tracing();
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    let hash = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(hash, H256::from_bytes([0x33; 32]));
    assert_eq!(signer.sign_count(), 1);
    assert_eq!(
        node.submitted_hex("author_submitExtrinsic").unwrap(),
        format!("0x{}", GOLDEN_EXTRINSIC)
    );
}

#[tokio::test]
async fn test_submit_fetches_each_input_once() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(node.count("system_accountNextIndex"), 1);
    assert_eq!(node.count("chain_getFinalizedHead"), 1);
    assert_eq!(node.count("chain_getHeader"), 1);
    assert_eq!(node.count("author_submitExtrinsic"), 1);
    assert_eq!(
        node.params_of("system_accountNextIndex").unwrap(),
        vec![json!(alice().to_ss58(GENERIC_SS58_PREFIX))]
    );
    assert_eq!(
        node.params_of("chain_getHeader").unwrap(),
        vec![json!(H256::from_bytes(FINALIZED).to_string())]
    );
}

#[tokio::test]
async fn test_submit_decodes_back() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)).tip(5),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let hex = node.submitted_hex("author_submitExtrinsic").unwrap();
    let bytes = ::hex::decode(hex.trim_start_matches("0x")).unwrap();
    let decoded = decode_extrinsic(&metadata(), &bytes).unwrap();

    let signature = decoded.signature.unwrap();
    assert_eq!(signature.extra.nonce, 3);
    assert_eq!(signature.extra.tip, 5);
    assert_eq!(signature.extra.era, Era::mortal(64, 1000));
    assert_eq!(decoded.call.pallet, "Balances");
    assert_eq!(decoded.call.function, "transfer");
}

#[tokio::test]
async fn test_submit_and_watch_until_finalized() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    let watch = service(node.clone())
        .submit_and_watch(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let block = watch.wait_for_finalized().await.unwrap();
    assert_eq!(block, H256::from_bytes([0x44; 32]));
    assert_eq!(node.count("author_submitAndWatchExtrinsic"), 1);
    assert_eq!(node.unsubscribed(), 1);
}

#[tokio::test]
async fn test_watch_reports_dropped_extrinsic() {
    let node = Arc::new(MockNode::new().with_statuses(vec![json!("ready"), json!("dropped")]));
    let signer = CountingSigner::new(alice());

    let watch = service(node)
        .submit_and_watch(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let expected = watch.hash();

    match watch.wait_for_finalized().await {
        Err(Error::NotIncluded { hash, status }) => {
            assert_eq!(hash, expected);
            assert_eq!(status, "Dropped");
        }
        other => panic!("expected NotIncluded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_stream_ends_early() {
    let node = Arc::new(MockNode::new().with_statuses(vec![json!("ready")]));
    let signer = CountingSigner::new(alice());

    let watch = service(node)
        .submit_and_watch(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        watch.wait_for_in_block().await,
        Err(Error::Rpc(RpcError::SubscriptionClosed))
    ));
}

// =============================================================================
// Fee estimation
// =============================================================================

#[tokio::test]
async fn test_estimate_fee_uses_placeholder_signature() {
    let node = Arc::new(MockNode::new());

    let fee = service(node.clone())
        .estimate_fee(
            ExtrinsicBuilder::new().call(transfer(1000)),
            alice(),
            CryptoType::Sr25519,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(fee.partial_fee, 15_600_000_123);
    assert_eq!(fee.class, DispatchClass::Normal);

    let hex = node.submitted_hex("payment_queryInfo").unwrap();
    let bytes = ::hex::decode(hex.trim_start_matches("0x")).unwrap();
    // compact(len) ++ 0x84 ++ MultiAddress::Id ++ MultiSignature::Sr25519(zeros)
    let sig_start = 2 + 1 + 33;
    assert_eq!(bytes[sig_start], 1);
    assert!(bytes[sig_start + 1..sig_start + 65].iter().all(|b| *b == 0));
    assert_eq!(node.count("author_submitExtrinsic"), 0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_multiple_calls_become_batch_all() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    let extrinsic = service(node)
        .build_signed(
            ExtrinsicBuilder::new().call(remark(b"a")).call(transfer(7)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Utility (26), batch_all (2), two calls
    assert_eq!(&extrinsic.call[..3], &[26, 2, 0x08]);

    let bytes = extrinsic.encode();
    let decoded = decode_extrinsic(&metadata(), &bytes).unwrap();
    assert_eq!(decoded.call.pallet, "Utility");
    assert_eq!(decoded.call.function, "batch_all");
}

#[tokio::test]
async fn test_non_atomic_batch() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());

    let extrinsic = service(node)
        .build_signed(
            ExtrinsicBuilder::new()
                .call(remark(b"a"))
                .call(remark(b"b"))
                .atomic_batch(false),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(&extrinsic.call[..2], &[26, 0]);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_nonce_failure_skips_signing() {
    init_tracing();
    let node = Arc::new(MockNode::new().fail("system_accountNextIndex", -32000, "unavailable"));
    let signer = CountingSigner::new(alice());

    let result = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(Error::Rpc(RpcError::Rpc { code: -32000, .. }))
    ));
    assert_eq!(signer.sign_count(), 0);
    assert_eq!(node.count("author_submitExtrinsic"), 0);
    // Never retried
    assert_eq!(node.count("system_accountNextIndex"), 1);
}

#[tokio::test]
async fn test_header_failure_skips_signing() {
    let node = Arc::new(MockNode::new().fail("chain_getHeader", -32603, "internal"));
    let signer = CountingSigner::new(alice());

    let result = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(signer.sign_count(), 0);
    assert_eq!(node.count("chain_getHeader"), 1);
}

#[tokio::test]
async fn test_pool_rejection_surfaces_invalid_transaction() {
    let node = Arc::new(MockNode::new().fail(
        "author_submitExtrinsic",
        1010,
        "Invalid Transaction: Transaction is outdated",
    ));
    let signer = CountingSigner::new(alice());

    let result = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;

    match result {
        Err(Error::Rpc(RpcError::InvalidTransaction { message, .. })) => {
            assert!(message.contains("outdated"));
        }
        other => panic!("expected InvalidTransaction, got {:?}", other),
    }
    assert_eq!(signer.sign_count(), 1);
    assert_eq!(node.count("author_submitExtrinsic"), 1);
}

#[tokio::test]
async fn test_pool_rejection_resets_tracked_nonce() {
    let node = Arc::new(MockNode::new().fail(
        "author_submitExtrinsic",
        1010,
        "Invalid Transaction: Transaction is outdated",
    ));
    let signer = CountingSigner::new(alice());
    let service = service(node.clone()).with_config(ServiceConfig {
        track_nonces: true,
        ..ServiceConfig::default()
    });
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let _ = service
            .submit(ExtrinsicBuilder::new().call(transfer(1)), &signer, &cancel)
            .await;
    }
    // The rejection dropped the cached nonce, so the second run fetched again
    assert_eq!(node.count("system_accountNextIndex"), 2);
}

#[tokio::test]
async fn test_tracked_nonce_survives_estimates_and_failures() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());
    let service = service_with_tracking(node.clone());
    let cancel = CancellationToken::new();
    let nonce_of = |extrinsic: Extrinsic| extrinsic.signature.unwrap().extra.nonce;

    service
        .estimate_fee(
            ExtrinsicBuilder::new().call(transfer(1)),
            alice(),
            CryptoType::Ed25519,
            &cancel,
        )
        .await
        .unwrap();
    let after_estimate = service
        .build_signed(ExtrinsicBuilder::new().call(transfer(1)), &signer, &cancel)
        .await
        .unwrap();
    assert_eq!(nonce_of(after_estimate), 3);

    // A fresh service: one failed build, then a good one
    let service = service_with_tracking(node.clone());
    let unknown = Call::new("Balances", "burn", Value::unnamed([]));
    assert!(service
        .build_signed(ExtrinsicBuilder::new().call(unknown), &signer, &cancel)
        .await
        .is_err());
    let after_failure = service
        .build_signed(ExtrinsicBuilder::new().call(transfer(1)), &signer, &cancel)
        .await
        .unwrap();
    assert_eq!(nonce_of(after_failure), 3);
}

fn service_with_tracking(node: Arc<MockNode>) -> TransactionService {
    service(node).with_config(ServiceConfig {
        track_nonces: true,
        ..ServiceConfig::default()
    })
}

#[tokio::test]
async fn test_metadata_download_failure_skips_signing() {
    let node = Arc::new(MockNode::new().fail(
        "state_getMetadata",
        -32000,
        "state unavailable",
    ));
    let runtime = RpcRuntimeProvider::new(node.clone());
    let service = TransactionService::new(node.clone(), Arc::new(runtime));
    let signer = CountingSigner::new(alice());

    let result = service
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(Error::Rpc(RpcError::Rpc { code: -32000, .. }))));
    assert_eq!(signer.sign_count(), 0);
}

#[tokio::test]
async fn test_metadata_downloaded_once_per_runtime() {
    init_tracing();
    let node = Arc::new(MockNode::new());
    let runtime = RpcRuntimeProvider::new(node.clone());
    let service = TransactionService::new(node.clone(), Arc::new(runtime));
    let signer = CountingSigner::new(alice());
    let cancel = CancellationToken::new();
    let submit = || {
        service.submit(ExtrinsicBuilder::new().call(transfer(1000)), &signer, &cancel)
    };

    submit().await.unwrap();
    assert_eq!(
        node.submitted_hex("author_submitExtrinsic").unwrap(),
        format!("0x{}", GOLDEN_EXTRINSIC)
    );
    submit().await.unwrap();
    assert_eq!(node.count("state_getMetadata"), 1);

    node.upgrade(SPEC_VERSION + 1);
    submit().await.unwrap();
    assert_eq!(node.count("state_getMetadata"), 2);
    assert_ne!(
        node.submitted_hex("author_submitExtrinsic").unwrap(),
        format!("0x{}", GOLDEN_EXTRINSIC)
    );
}

#[tokio::test]
async fn test_rpc_runtime_provider_matches_static_context() {
    let node = Arc::new(MockNode::new());
    let runtime = RpcRuntimeProvider::new(node.clone()).with_metadata(SPEC_VERSION, metadata());
    let service = TransactionService::new(node.clone(), Arc::new(runtime));
    let signer = CountingSigner::new(alice());

    service
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        node.submitted_hex("author_submitExtrinsic").unwrap(),
        format!("0x{}", GOLDEN_EXTRINSIC)
    );
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_client_request_flow() {
    let node = Arc::new(MockNode::new());
    let client = Substrate::with_engine(node.clone())
        .runtime_provider(StaticRuntime(context()))
        .signer(CountingSigner::new(alice()))
        .build();

    let hash = client.extrinsic().call(transfer(1000)).await.unwrap();
    assert_eq!(hash, H256::from_bytes([0x33; 32]));
    assert_eq!(
        node.submitted_hex("author_submitExtrinsic").unwrap(),
        format!("0x{}", GOLDEN_EXTRINSIC)
    );

    let fee = client.extrinsic().call(transfer(1000)).estimate_fee().await.unwrap();
    assert_eq!(fee.partial_fee, 15_600_000_123);

    let hex = client.extrinsic().call(transfer(1000)).build_signed().await.unwrap();
    assert_eq!(hex, format!("0x{}", GOLDEN_EXTRINSIC));
}

#[tokio::test]
async fn test_client_without_signer() {
    let node = Arc::new(MockNode::new());
    let client = Substrate::with_engine(node.clone())
        .runtime_provider(StaticRuntime(context()))
        .build();

    let result = client.extrinsic().call(transfer(1000)).await;
    assert!(matches!(result, Err(Error::NoSigner)));

    // Fee estimation only needs an account
    let fee = client
        .extrinsic()
        .call(transfer(1000))
        .sender(alice(), CryptoType::Ed25519)
        .estimate_fee()
        .await
        .unwrap();
    assert_eq!(fee.partial_fee, 15_600_000_123);
    assert!(node.methods().iter().all(|m| m != "author_submitExtrinsic"));
}

#[tokio::test]
async fn test_client_chain_queries() {
    let node = Arc::new(MockNode::new());
    let client = Substrate::with_engine(node).build();

    let version = client.runtime_version().await.unwrap();
    assert_eq!(version.spec_version, SPEC_VERSION);
    assert_eq!(client.finalized_head().await.unwrap(), H256::from_bytes(FINALIZED));
    let header = client.header(H256::from_bytes(FINALIZED)).await.unwrap().unwrap();
    assert_eq!(header.number, 1000);
    assert_eq!(client.account_next_index(&alice()).await.unwrap(), 3);
}
