//! Integration tests for substrate-kit.
//!
//! Everything runs against an in-process node double, so no network access
//! is needed.
//!
//! Run with: `cargo test --test integration`

mod cancellation_integration;
mod mock_node;
mod offline_signing_integration;
mod pipeline_integration;
