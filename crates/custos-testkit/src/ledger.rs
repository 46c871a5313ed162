//! Call execution double

use async_trait::async_trait;
use custos_core::{Address, CallExecutionEffects, CustosError, ExternalCall, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// A batch the ledger executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedBatch {
    pub wallet: Address,
    pub calls: Vec<ExternalCall>,
}

#[derive(Debug, Default)]
struct Recorder {
    executed: Vec<ExecutedBatch>,
    failing: bool,
}

/// Records executed batches; can be switched to reject every batch
#[derive(Debug, Clone, Default)]
pub struct RecordingCallExecutor {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingCallExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent batches fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Batches executed so far, oldest first.
    pub fn executed(&self) -> Vec<ExecutedBatch> {
        self.inner.lock().executed.clone()
    }

    /// Every executed call, flattened.
    pub fn calls(&self) -> Vec<ExternalCall> {
        self.inner
            .lock()
            .executed
            .iter()
            .flat_map(|batch| batch.calls.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl CallExecutionEffects for RecordingCallExecutor {
    async fn execute_batch(&self, wallet: Address, calls: &[ExternalCall]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.failing {
            tracing::debug!(%wallet, calls = calls.len(), "ledger double rejecting batch");
            return Err(CustosError::execution("ledger rejected the batch"));
        }
        inner.executed.push(ExecutedBatch {
            wallet,
            calls: calls.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_records_until_failing() {
        let ledger = RecordingCallExecutor::new();
        let wallet = Address::repeat_byte(1);
        let call = ExternalCall::transfer(Address::repeat_byte(2), 5);
        ledger.execute_batch(wallet, &[call.clone()]).await.unwrap();
        ledger.set_failing(true);
        assert_matches!(
            ledger.execute_batch(wallet, &[call.clone()]).await,
            Err(CustosError::Execution { .. })
        );
        assert_eq!(ledger.calls(), vec![call]);
    }
}
