//! Custos Testing Infrastructure
//!
//! Shared test setup for the Custos crates: deterministic secp256k1 signers,
//! a ledger clock that only moves when told to, a call executor that records
//! (or rejects) batches, and wallet fixtures wired to a relay executor.
//!
//! ```rust,ignore
//! use custos_testkit::*;
//!
//! #[tokio::test]
//! async fn lock_wallet() {
//!     let fx = WalletFixture::builder().guardians(2).build().await;
//!     fx.relay(Operation::Lock, &[&fx.owner]).await.unwrap();
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

pub mod fixtures;
pub mod keys;
pub mod ledger;
pub mod time;

pub use fixtures::*;
pub use keys::TestSigner;
pub use ledger::{ExecutedBatch, RecordingCallExecutor};
pub use time::ControllableLedgerClock;

pub use custos_relay::Operation;
