//! # Custos Relay
//!
//! Meta-transaction execution for Custos wallets. A [`RelayExecutor`] accepts
//! off-chain signed [`RelayRequest`]s, checks them against the nonce tracker,
//! the signature policy and the wallet's lock, dispatches the [`Operation`] to
//! the feature it targets, authorizes every outgoing call through the filter
//! engine and commits the result atomically.
//!
//! Ledger time and call execution come from the effect traits in
//! `custos_core::effects`, so the same executor runs against test doubles and
//! real ledger adapters.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Relay executor, receipts and refunds
pub mod executor;

/// Feature registry and per-feature execution
pub mod features;

/// Wallet operations
pub mod operation;

/// Relay requests and their canonical hash
pub mod request;

pub use executor::{Refund, RelayExecutor, RelayReceipt};
pub use features::{FeatureRegistry, OperationContext};
pub use operation::{FeatureKind, Operation};
pub use request::{RelayRequest, DEFAULT_GAS_LIMIT};
