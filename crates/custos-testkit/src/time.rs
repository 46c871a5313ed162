//! Controllable ledger clock for deterministic tests

use async_trait::async_trait;
use custos_core::{LedgerTime, LedgerTimeEffects, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Ledger clock that only moves when a test moves it
#[derive(Debug, Clone)]
pub struct ControllableLedgerClock {
    current: Arc<Mutex<LedgerTime>>,
}

impl ControllableLedgerClock {
    /// Start at `block` / `timestamp`.
    pub fn new(block: u64, timestamp: u64) -> Self {
        Self {
            current: Arc::new(Mutex::new(LedgerTime::new(block, timestamp))),
        }
    }

    /// Current time.
    pub fn now(&self) -> LedgerTime {
        *self.current.lock()
    }

    /// Advance the timestamp by `seconds`, mining one block.
    pub fn advance(&self, seconds: u64) -> LedgerTime {
        let mut current = self.current.lock();
        current.timestamp += seconds;
        current.block += 1;
        *current
    }

    /// Jump to an absolute timestamp, mining one block.
    pub fn set_timestamp(&self, timestamp: u64) -> LedgerTime {
        let mut current = self.current.lock();
        current.timestamp = timestamp;
        current.block += 1;
        *current
    }

    /// Mine `blocks` blocks without moving the timestamp.
    pub fn advance_blocks(&self, blocks: u64) -> LedgerTime {
        let mut current = self.current.lock();
        current.block += blocks;
        *current
    }
}

impl Default for ControllableLedgerClock {
    fn default() -> Self {
        Self::new(1, 1_000)
    }
}

#[async_trait]
impl LedgerTimeEffects for ControllableLedgerClock {
    async fn ledger_time(&self) -> Result<LedgerTime> {
        Ok(self.now())
    }
}
