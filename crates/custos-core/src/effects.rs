//! Effect interfaces for the ledger collaborators
//!
//! The authorization core never reads a clock or moves value itself. Relay
//! orchestration asks a [`LedgerTimeEffects`] handler for the current block and
//! timestamp, and hands fully authorized outgoing calls to a
//! [`CallExecutionEffects`] handler which executes them all-or-nothing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::Result;
use crate::identifiers::Address;
use crate::time::LedgerTime;

/// An outgoing call issued by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalCall {
    /// Destination contract or account
    pub to: Address,
    /// Native value attached to the call
    pub value: u128,
    /// Call payload (selector + argument words), empty for plain value transfers
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl ExternalCall {
    /// Call with a payload and no value.
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, value: 0, data }
    }

    /// Plain native value transfer.
    pub fn transfer(to: Address, value: u128) -> Self {
        Self {
            to,
            value,
            data: Vec::new(),
        }
    }

    /// Attach native value.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let digits = s.strip_prefix("0x").unwrap_or(&s);
            hex::decode(digits).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

/// Access to the time of the executing ledger transaction
#[async_trait]
pub trait LedgerTimeEffects: Send + Sync {
    /// Current block height and timestamp.
    async fn ledger_time(&self) -> Result<LedgerTime>;
}

/// Execution of already-authorized outgoing calls
#[async_trait]
pub trait CallExecutionEffects: Send + Sync {
    /// Execute `calls` on behalf of `wallet`. Either every call takes effect or none.
    async fn execute_batch(&self, wallet: Address, calls: &[ExternalCall]) -> Result<()>;
}

/// Blanket implementation for Arc<T> where T: LedgerTimeEffects
#[async_trait]
impl<T: LedgerTimeEffects + ?Sized> LedgerTimeEffects for Arc<T> {
    async fn ledger_time(&self) -> Result<LedgerTime> {
        (**self).ledger_time().await
    }
}

/// Blanket implementation for Arc<T> where T: CallExecutionEffects
#[async_trait]
impl<T: CallExecutionEffects + ?Sized> CallExecutionEffects for Arc<T> {
    async fn execute_batch(&self, wallet: Address, calls: &[ExternalCall]) -> Result<()> {
        (**self).execute_batch(wallet, calls).await
    }
}
