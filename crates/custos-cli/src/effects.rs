//! Effect handlers for offline evaluation

use async_trait::async_trait;
use custos_core::{
    Address, CallExecutionEffects, CustosError, ExternalCall, LedgerTime, LedgerTimeEffects,
    Result,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time standing in for the ledger; the block height is fixed
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    pub block: u64,
}

#[async_trait]
impl LedgerTimeEffects for WallClock {
    async fn ledger_time(&self) -> Result<LedgerTime> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CustosError::internal(format!("system clock before epoch: {e}")))?
            .as_secs();
        Ok(LedgerTime::new(self.block, timestamp))
    }
}

/// Ledger that never executes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLedger;

#[async_trait]
impl CallExecutionEffects for OfflineLedger {
    async fn execute_batch(&self, wallet: Address, calls: &[ExternalCall]) -> Result<()> {
        Err(CustosError::execution(format!(
            "offline: refusing {} call(s) from {wallet}",
            calls.len()
        )))
    }
}
