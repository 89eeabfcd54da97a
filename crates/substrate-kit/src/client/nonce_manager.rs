//! Nonce tracking for back-to-back submissions from one account.
//!
//! The transaction service asks the node for `system_accountNextIndex` on
//! every request, so two submissions sent without awaiting the first can
//! observe the same nonce. A [`NonceManager`] hands out increasing nonces
//! locally after the first fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::AccountId;

/// Hands out consecutive nonces per account.
#[derive(Debug)]
pub struct NonceManager {
    /// Next nonce to hand out, per account.
    nonces: Mutex<HashMap<AccountId, AtomicU32>>,
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceManager {
    pub fn new() -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
        }
    }

    /// Get the next nonce for `account`.
    ///
    /// The first call for an account runs `fetch_next_index`, which must
    /// return the node's next usable index; later calls increment locally.
    pub async fn next_nonce<F, Fut>(
        &self,
        account: &AccountId,
        fetch_next_index: F,
    ) -> Result<u32, crate::Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u32, crate::Error>>,
    {
        // Fast path: cached
        {
            let nonces = self.nonces.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(atomic) = nonces.get(account) {
                return Ok(atomic.fetch_add(1, Ordering::SeqCst));
            }
        }

        let chain_next = fetch_next_index().await?;

        let mut nonces = self.nonces.lock().unwrap_or_else(|e| e.into_inner());
        // Another task may have fetched meanwhile
        if let Some(atomic) = nonces.get(account) {
            return Ok(atomic.fetch_add(1, Ordering::SeqCst));
        }
        nonces.insert(*account, AtomicU32::new(chain_next + 1));
        Ok(chain_next)
    }

    /// Forget the cached nonce so the next call fetches from the node.
    ///
    /// Call this after the node rejects an extrinsic as stale or future.
    pub fn invalidate(&self, account: &AccountId) {
        let mut nonces = self.nonces.lock().unwrap_or_else(|e| e.into_inner());
        nonces.remove(account);
    }
}
