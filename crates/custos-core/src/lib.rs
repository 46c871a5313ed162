//! Custos Core - shared foundation of the wallet authorization core
//!
//! Everything the policy engine's components agree on lives here:
//!
//! - Identities (`Address`), feature and registry identifiers, relay `Nonce`s
//! - The unified `CustosError` and its stable `ErrorKind`
//! - Keccak-256 hashing and call selectors
//! - Recoverable secp256k1 signatures and signer recovery
//! - The strict call payload codec used by the filter engine
//! - `LedgerTime`, configuration, and the effect interfaces to the ledger

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Call payload decoding and encoding
pub mod abi;

/// Configuration loading and validation
pub mod config;

/// Recoverable signatures and signer identity recovery
pub mod crypto;

/// Ledger collaborator interfaces
pub mod effects;

/// Unified error handling
pub mod errors;

/// Keccak-256 hashing
pub mod hash;

/// Addresses, feature/registry identifiers and nonces
pub mod identifiers;

/// Ledger time
pub mod time;

pub use abi::{split_selector, AbiError, ArgReader, PayloadBuilder, Selector, U256};
pub use config::{CustosConfig, GasSchedule};
pub use crypto::{recover_signer, RecoverableSignature, SigningIdentity};
pub use effects::{CallExecutionEffects, ExternalCall, LedgerTimeEffects};
pub use errors::{CustosError, ErrorKind, Remedy, Result};
pub use identifiers::{Address, FeatureId, Nonce, RegistryId};
pub use time::LedgerTime;
