//! # Custos Guardians
//!
//! Per-wallet authorization state and the timing rules that govern it:
//!
//! - **Nonce tracking**: a monotonic watermark per wallet; replays and stale
//!   nonces are rejected without touching state
//! - **Guardian/lock state machine**: locks with lazy expiry, guardian-set
//!   changes behind a security period and a bounded confirmation window
//! - **Recovery state machine**: one in-flight ownership recovery per wallet,
//!   executable after a delay, cancellable by owner plus guardians
//!
//! Transitions are pure functions of a [`WalletRecord`] and the current
//! [`custos_core::LedgerTime`]; nothing here reads a clock or performs I/O.
//! Signature thresholds are checked upstream by the policy evaluator.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Guardian-set changes and locks
pub mod guardian;

/// Relay nonce watermark
pub mod nonce;

/// Ownership recovery
pub mod recovery;

/// Wallet record and its components
pub mod wallet;

pub use guardian::GuardianTiming;
pub use nonce::reserve;
pub use recovery::{RecoveryOutcome, RecoveryPolicy};
pub use wallet::{
    majority, GuardianChangeOp, GuardianSet, LockState, Locker, PendingGuardianChange,
    PendingRecovery, WalletRecord,
};
