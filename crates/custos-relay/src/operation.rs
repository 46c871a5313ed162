//! Operations a wallet can be asked to perform

use custos_authorization::{FilterKind, OperationClass};
use custos_core::{Address, ExternalCall, RegistryId};
use serde::{Deserialize, Serialize};

/// Capability family an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    /// Guardians, locks, recovery and ownership
    Security,
    /// Outgoing calls through the filter engine
    Transactions,
    /// Registry selection and wallet-governed registries
    Registries,
}

impl FeatureKind {
    /// Stable kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Security => "security",
            FeatureKind::Transactions => "transactions",
            FeatureKind::Registries => "registries",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested wallet operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Execute outgoing calls, each authorized by the filter engine
    Multicall { calls: Vec<ExternalCall> },
    /// Transfer ownership outside recovery
    TransferOwnership { new_owner: Address },
    Lock,
    Unlock,
    AddGuardian { guardian: Address },
    RevokeGuardian { guardian: Address },
    ConfirmGuardianChange { guardian: Address },
    CancelGuardianChange { guardian: Address },
    StartRecovery { new_owner: Address },
    FinalizeRecovery,
    CancelRecovery,
    /// Enable or disable a registry for the wallet
    ToggleRegistry { registry: RegistryId, enabled: bool },
    /// Create a registry governed by the wallet
    CreateRegistry,
    /// Add or replace an entry of a wallet-governed registry
    AddRegistryEntry {
        registry: RegistryId,
        destination: Address,
        filter: Option<FilterKind>,
    },
    /// Remove an entry of a wallet-governed registry
    RemoveRegistryEntry {
        registry: RegistryId,
        destination: Address,
    },
    /// Enable or disable an entry of a wallet-governed registry
    SetRegistryEntryEnabled {
        registry: RegistryId,
        destination: Address,
        enabled: bool,
    },
}

impl Operation {
    /// Signature policy class of the operation.
    pub fn class(&self) -> OperationClass {
        match self {
            Operation::Multicall { .. } => OperationClass::Ordinary,
            Operation::TransferOwnership { .. } => OperationClass::GuardianApproved,
            Operation::Lock => OperationClass::Lock,
            Operation::Unlock => OperationClass::Unlock,
            Operation::AddGuardian { .. } => OperationClass::GuardianAdd,
            Operation::RevokeGuardian { .. } => OperationClass::GuardianRevoke,
            Operation::ConfirmGuardianChange { .. } => OperationClass::GuardianConfirm,
            Operation::CancelGuardianChange { .. } => OperationClass::GuardianCancel,
            Operation::StartRecovery { .. } => OperationClass::RecoveryStart,
            Operation::FinalizeRecovery => OperationClass::RecoveryFinalize,
            Operation::CancelRecovery => OperationClass::RecoveryCancel,
            Operation::ToggleRegistry { .. }
            | Operation::CreateRegistry
            | Operation::AddRegistryEntry { .. }
            | Operation::RemoveRegistryEntry { .. }
            | Operation::SetRegistryEntryEnabled { .. } => OperationClass::RegistryManagement,
        }
    }

    /// Feature family able to perform the operation.
    pub fn feature_kind(&self) -> FeatureKind {
        match self {
            Operation::Multicall { .. } => FeatureKind::Transactions,
            Operation::ToggleRegistry { .. }
            | Operation::CreateRegistry
            | Operation::AddRegistryEntry { .. }
            | Operation::RemoveRegistryEntry { .. }
            | Operation::SetRegistryEntryEnabled { .. } => FeatureKind::Registries,
            _ => FeatureKind::Security,
        }
    }

    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Multicall { .. } => "multicall",
            Operation::TransferOwnership { .. } => "transfer_ownership",
            Operation::Lock => "lock",
            Operation::Unlock => "unlock",
            Operation::AddGuardian { .. } => "add_guardian",
            Operation::RevokeGuardian { .. } => "revoke_guardian",
            Operation::ConfirmGuardianChange { .. } => "confirm_guardian_change",
            Operation::CancelGuardianChange { .. } => "cancel_guardian_change",
            Operation::StartRecovery { .. } => "start_recovery",
            Operation::FinalizeRecovery => "finalize_recovery",
            Operation::CancelRecovery => "cancel_recovery",
            Operation::ToggleRegistry { .. } => "toggle_registry",
            Operation::CreateRegistry => "create_registry",
            Operation::AddRegistryEntry { .. } => "add_registry_entry",
            Operation::RemoveRegistryEntry { .. } => "remove_registry_entry",
            Operation::SetRegistryEntryEnabled { .. } => "set_registry_entry_enabled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_actions_run_while_locked() {
        for op in [
            Operation::Unlock,
            Operation::StartRecovery {
                new_owner: Address::repeat_byte(1),
            },
            Operation::FinalizeRecovery,
            Operation::CancelRecovery,
            Operation::CancelGuardianChange {
                guardian: Address::repeat_byte(2),
            },
        ] {
            assert!(op.class().allowed_while_locked(), "{}", op.name());
        }
        assert!(!Operation::Multicall { calls: vec![] }
            .class()
            .allowed_while_locked());
    }

    #[test]
    fn test_json_shape() {
        let op = Operation::AddGuardian {
            guardian: Address::repeat_byte(0x11),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(
            json,
            format!("{{\"add_guardian\":{{\"guardian\":\"{}\"}}}}", Address::repeat_byte(0x11))
        );
        assert_eq!(serde_json::from_str::<Operation>("\"lock\"").unwrap(), Operation::Lock);
    }
}
