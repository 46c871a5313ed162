//! Unified error system for Custos
//!
//! Every authorization decision that rejects a request surfaces one of these
//! variants. Off-chain tooling inspects [`CustosError::kind`] to decide whether to
//! resubmit with a fresh nonce, wait for a timelock, or gather more signatures.

use crate::identifiers::{Address, Nonce};
use serde::{Deserialize, Serialize};

/// Unified error type for all Custos operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CustosError {
    /// Nonce is not strictly greater than the last consumed one (or too far ahead)
    #[error("Replayed or stale nonce {nonce} (last consumed: {last})")]
    ReplayedOrStaleNonce {
        /// Nonce carried by the rejected request
        nonce: Nonce,
        /// Watermark recorded for the wallet
        last: Nonce,
    },

    /// A signature could not be recovered, or recovered to a duplicate signer
    #[error("Invalid signature: {message}")]
    InvalidSignature {
        /// Error message describing the signature failure
        message: String,
    },

    /// The recovered signer set does not satisfy the operation's policy
    #[error("Insufficient authorization: {message}")]
    InsufficientAuthorization {
        /// Error message describing the missing signers
        message: String,
    },

    /// A signer is neither the owner nor a current guardian
    #[error("Unknown signer: {signer}")]
    UnknownSigner {
        /// Identity recovered from the offending signature
        signer: Address,
    },

    /// The wallet is locked and the operation is not allowed while locked
    #[error("Wallet {wallet} is locked until {until}")]
    WalletLocked {
        /// Locked wallet
        wallet: Address,
        /// Lock expiry (seconds)
        until: u64,
    },

    /// The request targets a feature that is unknown or not enabled for the wallet
    #[error("Unauthorized feature: {message}")]
    UnauthorizedFeature {
        /// Error message describing the feature
        message: String,
    },

    /// An outgoing call was rejected by the filter engine
    #[error("Call not authorized: call to {destination}")]
    CallNotAuthorized {
        /// Destination of the rejected call
        destination: Address,
    },

    /// A recovery is already in flight for the wallet
    #[error("Recovery already pending for {wallet}")]
    RecoveryAlreadyPending {
        /// Wallet under recovery
        wallet: Address,
    },

    /// Recovery finalization attempted before its deadline
    #[error("Recovery not executable before {executable_after}")]
    RecoveryNotYetExecutable {
        /// Earliest finalization time (seconds)
        executable_after: u64,
    },

    /// No recovery is in flight for the wallet
    #[error("No recovery pending for {wallet}")]
    NoRecoveryPending {
        /// Wallet without a pending recovery
        wallet: Address,
    },

    /// The operation names an invalid target identity
    #[error("Invalid target: {message}")]
    InvalidTarget {
        /// Error message describing the invalid target
        message: String,
    },

    /// A pending guardian change is missing or outside its confirmation window
    #[error("Guardian change not eligible: {message}")]
    GuardianChangeNotEligible {
        /// Error message describing the eligibility failure
        message: String,
    },

    /// A staged registry change has not reached its effective time
    #[error("Timelock pending until {effective_at}")]
    TimelockPending {
        /// Time at which the staged change becomes effective
        effective_at: u64,
    },

    /// The relayed request consumes more gas than it allows
    #[error("Gas limit exceeded: required {required}, limit {limit}")]
    GasLimitExceeded {
        /// Gas the request needs
        required: u64,
        /// Gas limit carried by the request
        limit: u64,
    },

    /// Wallet record does not exist
    #[error("Wallet not found: {wallet}")]
    WalletNotFound {
        /// Missing wallet
        wallet: Address,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// The underlying ledger failed to execute authorized calls
    #[error("Execution failed: {message}")]
    Execution {
        /// Error message reported by the ledger
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

/// Stable, payload-free classification of [`CustosError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ReplayedOrStaleNonce,
    InvalidSignature,
    InsufficientAuthorization,
    UnknownSigner,
    WalletLocked,
    UnauthorizedFeature,
    CallNotAuthorized,
    RecoveryAlreadyPending,
    RecoveryNotYetExecutable,
    NoRecoveryPending,
    InvalidTarget,
    GuardianChangeNotEligible,
    TimelockPending,
    GasLimitExceeded,
    WalletNotFound,
    Invalid,
    Serialization,
    Execution,
    Internal,
}

/// What a submitter should do after a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remedy {
    /// Sign again with a fresh nonce
    Resubmit,
    /// Wait for a deadline to pass
    Wait,
    /// Collect more (or different) signatures
    Escalate,
    /// Nothing will make this request succeed as-is
    Abandon,
}

impl ErrorKind {
    /// Suggested reaction for off-chain tooling.
    pub fn remedy(self) -> Remedy {
        match self {
            ErrorKind::ReplayedOrStaleNonce | ErrorKind::GasLimitExceeded => Remedy::Resubmit,
            ErrorKind::RecoveryNotYetExecutable
            | ErrorKind::GuardianChangeNotEligible
            | ErrorKind::TimelockPending
            | ErrorKind::WalletLocked => Remedy::Wait,
            ErrorKind::InsufficientAuthorization | ErrorKind::UnknownSigner => Remedy::Escalate,
            _ => Remedy::Abandon,
        }
    }
}

impl CustosError {
    /// Create an invalid signature error
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    /// Create an insufficient authorization error
    pub fn insufficient_authorization(message: impl Into<String>) -> Self {
        Self::InsufficientAuthorization {
            message: message.into(),
        }
    }

    /// Create an unauthorized feature error
    pub fn unauthorized_feature(message: impl Into<String>) -> Self {
        Self::UnauthorizedFeature {
            message: message.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            message: message.into(),
        }
    }

    /// Create a guardian change eligibility error
    pub fn guardian_change_not_eligible(message: impl Into<String>) -> Self {
        Self::GuardianChangeNotEligible {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Payload-free kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReplayedOrStaleNonce { .. } => ErrorKind::ReplayedOrStaleNonce,
            Self::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            Self::InsufficientAuthorization { .. } => ErrorKind::InsufficientAuthorization,
            Self::UnknownSigner { .. } => ErrorKind::UnknownSigner,
            Self::WalletLocked { .. } => ErrorKind::WalletLocked,
            Self::UnauthorizedFeature { .. } => ErrorKind::UnauthorizedFeature,
            Self::CallNotAuthorized { .. } => ErrorKind::CallNotAuthorized,
            Self::RecoveryAlreadyPending { .. } => ErrorKind::RecoveryAlreadyPending,
            Self::RecoveryNotYetExecutable { .. } => ErrorKind::RecoveryNotYetExecutable,
            Self::NoRecoveryPending { .. } => ErrorKind::NoRecoveryPending,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::GuardianChangeNotEligible { .. } => ErrorKind::GuardianChangeNotEligible,
            Self::TimelockPending { .. } => ErrorKind::TimelockPending,
            Self::GasLimitExceeded { .. } => ErrorKind::GasLimitExceeded,
            Self::WalletNotFound { .. } => ErrorKind::WalletNotFound,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Standard Result type for Custos operations
pub type Result<T> = std::result::Result<T, CustosError>;

impl From<bincode::Error> for CustosError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CustosError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CustosError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(format!("Invalid TOML: {err}"))
    }
}

impl From<std::io::Error> for CustosError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}
