//! Timeouts, cancellation and concurrency of the pipeline's fetch steps.
//!
//! All tests run on paused time, so delays cost nothing.

use std::sync::Arc;
use std::time::Duration;

use substrate_kit::*;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mock_node::*;

fn submit_transfer(
    node: Arc<MockNode>,
    signer: Arc<CountingSigner>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<Result<H256, Error>> {
    tokio::spawn(async move {
        service(node)
            .submit(
                ExtrinsicBuilder::new().call(transfer(1000)),
                signer.as_ref(),
                &cancel,
            )
            .await
    })
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetches_run_concurrently() {
    let node = Arc::new(
        MockNode::new()
            .delay("system_accountNextIndex", Duration::from_secs(5))
            .delay("chain_getFinalizedHead", Duration::from_secs(5)),
    );
    let signer = CountingSigner::new(alice());

    let start = Instant::now();
    service(node)
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_header_waits_for_head() {
    let node = Arc::new(
        MockNode::new()
            .delay("chain_getFinalizedHead", Duration::from_secs(3))
            .delay("chain_getHeader", Duration::from_secs(3)),
    );
    let signer = CountingSigner::new(alice());

    let start = Instant::now();
    service(node)
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_ends_request() {
    let node = Arc::new(
        MockNode::new()
            .fail("system_accountNextIndex", -32000, "unavailable")
            .delay("chain_getFinalizedHead", Duration::from_secs(10)),
    );
    let signer = CountingSigner::new(alice());

    let start = Instant::now();
    let result = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(10));
    // The head fetch was dropped before the header could be requested
    assert_eq!(node.count("chain_getHeader"), 0);
    assert_eq!(signer.sign_count(), 0);
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout() {
    let node = Arc::new(MockNode::new().delay("chain_getHeader", Duration::from_secs(30)));
    let signer = CountingSigner::new(alice());

    let result = service(node)
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;

    match result {
        Err(Error::Rpc(RpcError::Timeout { method, timeout_ms })) => {
            assert_eq!(method, "chain_getHeader");
            assert_eq!(timeout_ms, 20_000);
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(signer.sign_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_timeout_is_longer() {
    let node = Arc::new(
        MockNode::new().delay("author_submitExtrinsic", Duration::from_secs(45)),
    );
    let signer = CountingSigner::new(alice());

    // 45s exceeds the fetch timeout but not the submit timeout
    let hash = service(node.clone())
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(hash, H256::from_bytes([0x33; 32]));

    let node = Arc::new(
        MockNode::new().delay("author_submitExtrinsic", Duration::from_secs(61)),
    );
    let result = service(node)
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(Error::Rpc(RpcError::Timeout { timeout_ms: 60_000, .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeouts() {
    let node = Arc::new(
        MockNode::new().delay("system_accountNextIndex", Duration::from_secs(2)),
    );
    let signer = CountingSigner::new(alice());
    let service = service(node).with_config(ServiceConfig {
        fetch_timeout: Duration::from_secs(1),
        ..ServiceConfig::default()
    });

    let result = service
        .submit(
            ExtrinsicBuilder::new().call(transfer(1000)),
            &signer,
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(Error::Rpc(RpcError::Timeout { timeout_ms: 1_000, .. }))
    ));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_fetch() {
    init_tracing();
    let node = Arc::new(
        MockNode::new().delay("system_accountNextIndex", Duration::from_secs(10)),
    );
    let signer = Arc::new(CountingSigner::new(alice()));
    let cancel = CancellationToken::new();

    let handle = submit_transfer(node.clone(), signer.clone(), cancel.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(signer.sign_count(), 0);
    assert_eq!(node.count("author_submitExtrinsic"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_submit() {
    let node = Arc::new(
        MockNode::new().delay("author_submitExtrinsic", Duration::from_secs(30)),
    );
    let signer = Arc::new(CountingSigner::new(alice()));
    let cancel = CancellationToken::new();

    let handle = submit_transfer(node.clone(), signer.clone(), cancel.clone());
    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(signer.sign_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_token_never_touches_node_state() {
    let node = Arc::new(MockNode::new());
    let signer = CountingSigner::new(alice());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service(node.clone())
        .submit(ExtrinsicBuilder::new().call(transfer(1000)), &signer, &cancel)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(signer.sign_count(), 0);
    assert_eq!(node.count("author_submitExtrinsic"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_cancel_token() {
    let node = Arc::new(
        MockNode::new().delay("chain_getFinalizedHead", Duration::from_secs(10)),
    );
    let client = Substrate::with_engine(node)
        .runtime_provider(StaticRuntime(context()))
        .signer(CountingSigner::new(alice()))
        .build();
    let cancel = CancellationToken::new();

    let request = client
        .extrinsic()
        .call(transfer(1000))
        .cancel_token(cancel.clone());
    let handle = tokio::spawn(request.into_future());
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    assert!(matches!(handle.await.unwrap(), Err(Error::Cancelled)));
}
