//! # Custos Authorization
//!
//! Decides whether a request may proceed:
//!
//! - **Signature policy**: the operation-class matrix and signer verification
//! - **Dapp registries**: versioned, timelocked allow-lists of destinations
//! - **Filter engine**: deny-by-default authorization of outgoing calls, with
//!   structural filters over a small typed call grammar
//!
//! Nothing here mutates wallet state except registry toggles; relay
//! orchestration composes these checks with the guardian state machines.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Typed decoding of outgoing call payloads
pub mod calls;

/// Outgoing call authorization
pub mod engine;

/// Per-destination call filters
pub mod filters;

/// Signature policy matrix and signer verification
pub mod policy;

/// Dapp registries
pub mod registry;

/// Token registry interface
pub mod tokens;

pub use engine::{authorize_call, authorize_calls, is_authorized, recover_spender};
pub use filters::{CallSite, FilterContext};
pub use policy::{
    classify_signers, recover_signers, required_signers, verify_signatures, verify_signers,
    OperationClass, PolicyContext, SignerRequirement, SignerSet,
};
pub use registry::{DappRegistry, EntryVersion, FilterKind, PendingTimelock, RegistryEntry};
pub use tokens::{TokenRegistry, TradableTokens, NATIVE_TOKEN};
