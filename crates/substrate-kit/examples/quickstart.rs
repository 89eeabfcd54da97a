//! Quickstart - estimate, submit and watch a transfer
//!
//! Run: cargo run --example quickstart -- <dest-ss58>
//!
//! Set environment variables:
//!   SUBSTRATE_RPC_URL=ws://127.0.0.1:9944   (or polkadot / kusama / westend)
//!   SUBSTRATE_SEED=sr25519:0x...
//!   RUST_LOG=substrate_kit=debug           (optional, pipeline tracing)

use substrate_kit::*;
use tracing_subscriber::EnvFilter;

// ============================================================================
// 1. Chain info (read-only)
// ============================================================================

async fn chain_info(client: &Substrate) -> Result<u32, Error> {
    println!("=== Chain ===\n");

    let version = client.runtime_version().await?;
    println!("Runtime: {} v{}", version.spec_name, version.spec_version);

    let head = client.finalized_head().await?;
    if let Some(header) = client.header(head).await? {
        println!("Finalized: #{} ({})", header.number, head);
    }

    Ok(version.spec_version)
}

// ============================================================================
// 2. Fee estimate (placeholder signature, nothing is signed)
// ============================================================================

async fn estimate(client: &Substrate, dest: AccountId) -> Result<(), Error> {
    println!("\n=== Fee ===\n");

    let fee = client.transfer(dest, 1_000_000_000).estimate_fee().await?;
    println!("Partial fee: {} ({:?})", fee.partial_fee, fee.class);

    Ok(())
}

// ============================================================================
// 3. Submit and watch
// ============================================================================

async fn submit(client: &Substrate, dest: AccountId) -> Result<(), Error> {
    println!("\n=== Transfer ===\n");

    let watch = client
        .transfer(dest, 1_000_000_000)
        .tip(0)
        .submit_and_watch()
        .await?;
    println!("Submitted {}", watch.hash());

    let block = watch.wait_for_finalized().await?;
    println!("Finalized in {}", block);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(dest) = std::env::args().nth(1) else {
        eprintln!("usage: quickstart <dest-ss58>");
        return Ok(());
    };
    let dest: AccountId = dest.parse()?;

    // Runtime metadata is downloaded on the first request
    let client = Substrate::from_env()?.connect().await?;
    chain_info(&client).await?;

    if client.account_id().is_none() {
        println!("\nSet SUBSTRATE_SEED to estimate and submit the transfer.");
        return Ok(());
    }
    estimate(&client, dest).await?;
    submit(&client, dest).await?;

    Ok(())
}
