//! Feature registry and per-feature execution
//!
//! A wallet acts only through features it has authorized. Each registered
//! feature id is tagged with a [`FeatureKind`], and every kind exposes the same
//! `execute(context, operation)` contract: apply the operation to a staged
//! wallet and registry and return the outgoing calls it wants executed.

use custos_authorization::{DappRegistry, SignerSet};
use custos_core::{CustosError, ExternalCall, FeatureId, LedgerTime, Result};
use custos_guardians::{GuardianTiming, RecoveryPolicy, WalletRecord};
use std::collections::BTreeMap;

use crate::operation::{FeatureKind, Operation};

/// Staged state an operation executes against
pub struct OperationContext<'a> {
    pub wallet: &'a mut WalletRecord,
    pub registry: &'a mut DappRegistry,
    /// Verified signers (or the direct caller)
    pub signers: &'a SignerSet,
    pub now: LedgerTime,
    pub timing: GuardianTiming,
    pub recovery: RecoveryPolicy,
}

impl FeatureKind {
    /// Whether this feature can perform `operation`.
    pub fn handles(self, operation: &Operation) -> bool {
        operation.feature_kind() == self
    }

    /// Apply `operation` and return the outgoing calls it issues.
    pub fn execute(self, ctx: &mut OperationContext<'_>, operation: &Operation) -> Result<Vec<ExternalCall>> {
        if !self.handles(operation) {
            return Err(CustosError::unauthorized_feature(format!(
                "{self} feature cannot perform {}",
                operation.name()
            )));
        }
        match self {
            FeatureKind::Security => execute_security(ctx, operation).map(|()| Vec::new()),
            FeatureKind::Transactions => execute_transactions(operation),
            FeatureKind::Registries => execute_registries(ctx, operation).map(|()| Vec::new()),
        }
    }
}

fn execute_security(ctx: &mut OperationContext<'_>, operation: &Operation) -> Result<()> {
    let now = ctx.now;
    let wallet = &mut *ctx.wallet;
    match operation {
        Operation::TransferOwnership { new_owner } => wallet.transfer_ownership(*new_owner, now),
        Operation::Lock => {
            let locker = ctx
                .signers
                .locker()
                .ok_or_else(|| CustosError::insufficient_authorization("lock needs a signer"))?;
            wallet.lock(locker, now, &ctx.timing).map(drop)
        }
        Operation::Unlock => {
            let requester = ctx
                .signers
                .locker()
                .ok_or_else(|| CustosError::insufficient_authorization("unlock needs a signer"))?;
            wallet.unlock(requester, now)
        }
        Operation::AddGuardian { guardian } => wallet
            .propose_guardian_addition(*guardian, now, &ctx.timing)
            .map(drop),
        Operation::RevokeGuardian { guardian } => wallet
            .propose_guardian_revocation(*guardian, now, &ctx.timing)
            .map(drop),
        Operation::ConfirmGuardianChange { guardian } => wallet
            .confirm_guardian_change(*guardian, now, &ctx.timing)
            .map(drop),
        Operation::CancelGuardianChange { guardian } => {
            wallet.cancel_guardian_change(*guardian).map(drop)
        }
        Operation::StartRecovery { new_owner } => wallet
            .start_recovery(*new_owner, ctx.signers.guardians.clone(), now, &ctx.recovery)
            .map(drop),
        Operation::FinalizeRecovery => wallet.finalize_recovery(now, &ctx.recovery).map(drop),
        Operation::CancelRecovery => wallet.cancel_recovery().map(drop),
        other => Err(CustosError::internal(format!(
            "{} routed to the security feature",
            other.name()
        ))),
    }
}

fn execute_transactions(operation: &Operation) -> Result<Vec<ExternalCall>> {
    match operation {
        Operation::Multicall { calls } => Ok(calls.clone()),
        other => Err(CustosError::internal(format!(
            "{} routed to the transactions feature",
            other.name()
        ))),
    }
}

fn execute_registries(ctx: &mut OperationContext<'_>, operation: &Operation) -> Result<()> {
    let governor = ctx.wallet.address;
    let now = ctx.now;
    match *operation {
        Operation::ToggleRegistry { registry, enabled } => {
            ctx.registry.toggle_registry(ctx.wallet, registry, enabled)
        }
        Operation::CreateRegistry => ctx.registry.create_registry(governor).map(drop),
        Operation::AddRegistryEntry {
            registry,
            destination,
            filter,
        } => ctx
            .registry
            .add_entry(governor, registry, destination, filter, now),
        Operation::RemoveRegistryEntry {
            registry,
            destination,
        } => {
            if registry.is_shared() {
                return Err(CustosError::insufficient_authorization(
                    "wallets cannot edit the shared registry",
                ));
            }
            ctx.registry
                .remove_entry(governor, registry, destination, now)
                .map(drop)
        }
        Operation::SetRegistryEntryEnabled {
            registry,
            destination,
            enabled,
        } => {
            if registry.is_shared() {
                return Err(CustosError::insufficient_authorization(
                    "wallets cannot edit the shared registry",
                ));
            }
            ctx.registry
                .set_entry_enabled(governor, registry, destination, enabled, now)
                .map(drop)
        }
        ref other => Err(CustosError::internal(format!(
            "{} routed to the registries feature",
            other.name()
        ))),
    }
}

/// Features known to the relay, by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureRegistry {
    features: BTreeMap<FeatureId, FeatureKind>,
}

impl FeatureRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` as a feature of kind `kind`.
    pub fn register(&mut self, id: FeatureId, kind: FeatureKind) -> Result<()> {
        if self.features.contains_key(&id) {
            return Err(CustosError::invalid(format!("{id} is already registered")));
        }
        self.features.insert(id, kind);
        Ok(())
    }

    /// Kind of feature `id`, if registered.
    pub fn kind_of(&self, id: &FeatureId) -> Option<FeatureKind> {
        self.features.get(id).copied()
    }

    /// Iterate registered features in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &FeatureKind)> {
        self.features.iter()
    }

    /// Resolve the feature a request targets.
    ///
    /// The feature must be registered, authorized by the wallet, and able to
    /// perform the operation; anything else is `UnauthorizedFeature`.
    pub fn resolve(&self, wallet: &WalletRecord, id: FeatureId, operation: &Operation) -> Result<FeatureKind> {
        let kind = self
            .kind_of(&id)
            .ok_or_else(|| CustosError::unauthorized_feature(format!("unknown {id}")))?;
        if !wallet.has_feature(&id) {
            return Err(CustosError::unauthorized_feature(format!(
                "{id} is not authorized by wallet {}",
                wallet.address
            )));
        }
        if !kind.handles(operation) {
            return Err(CustosError::unauthorized_feature(format!(
                "{id} ({kind}) cannot perform {}",
                operation.name()
            )));
        }
        Ok(kind)
    }
}

impl FromIterator<(FeatureId, FeatureKind)> for FeatureRegistry {
    fn from_iter<I: IntoIterator<Item = (FeatureId, FeatureKind)>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
