//! Relay nonce tracking
//!
//! Each wallet keeps a single watermark: the highest nonce consumed so far. A
//! request is accepted only if its nonce is strictly above the watermark and its
//! block marker is not too far ahead of the current block. Nonces may be skipped,
//! never reused.

use custos_core::{CustosError, LedgerTime, Nonce, Result};

use crate::wallet::WalletRecord;

/// Consume `nonce` against `watermark`.
///
/// Fails with `ReplayedOrStaleNonce` when `nonce <= watermark` or when its block
/// marker exceeds `now.block + block_bound`. On failure the watermark is untouched.
pub fn reserve(watermark: &mut Nonce, nonce: Nonce, now: LedgerTime, block_bound: u64) -> Result<()> {
    let stale = nonce <= *watermark;
    let too_far = nonce.block > now.block.saturating_add(block_bound);
    if stale || too_far {
        tracing::debug!(%nonce, last = %watermark, stale, too_far, "nonce rejected");
        return Err(CustosError::ReplayedOrStaleNonce {
            nonce,
            last: *watermark,
        });
    }
    *watermark = nonce;
    Ok(())
}

impl WalletRecord {
    /// Consume a relay nonce for this wallet.
    pub fn reserve_nonce(&mut self, nonce: Nonce, now: LedgerTime, block_bound: u64) -> Result<()> {
        reserve(&mut self.last_nonce, nonce, now, block_bound)
    }
}
