//! Recovery state machine
//!
//! `NoRecovery → RecoveryPending(new_owner, executable_after, approvals) → NoRecovery`.
//! Starting a recovery locks the wallet with a recovery-held lock that only
//! finalize or cancel release.

use custos_core::{Address, CustosError, LedgerTime, Result};
use std::collections::BTreeSet;

use crate::wallet::{majority, LockState, Locker, PendingRecovery, WalletRecord};

/// Timing and policy parameters of the recovery state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Delay before a recovery becomes executable
    pub recovery_period: u64,
    /// Extra delay after which the owner may cancel alone
    pub lock_period: u64,
    /// Whether finalization clears the guardian set
    pub clear_guardians: bool,
}

impl From<&custos_core::CustosConfig> for RecoveryPolicy {
    fn from(config: &custos_core::CustosConfig) -> Self {
        Self {
            recovery_period: config.recovery_period,
            lock_period: config.lock_period,
            clear_guardians: config.clear_guardians_on_recovery,
        }
    }
}

/// Result of a successful finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Owner before finalization
    pub previous_owner: Address,
    /// Owner after finalization
    pub new_owner: Address,
    /// Whether the guardian set was cleared
    pub guardians_cleared: bool,
}

impl PendingRecovery {
    /// Whether the owner may cancel alone: guardians left the recovery hanging
    /// for a full lock period past its deadline.
    pub fn is_abandoned(&self, now: LedgerTime, lock_period: u64) -> bool {
        now.reached(self.executable_after.saturating_add(lock_period))
    }
}

impl WalletRecord {
    /// Start a recovery towards `new_owner`, approved by `approvals`.
    pub fn start_recovery(
        &mut self,
        new_owner: Address,
        approvals: BTreeSet<Address>,
        now: LedgerTime,
        policy: &RecoveryPolicy,
    ) -> Result<u64> {
        if self.pending_recovery.is_some() {
            return Err(CustosError::RecoveryAlreadyPending {
                wallet: self.address,
            });
        }
        if new_owner.is_zero() || new_owner == self.owner || new_owner == self.address {
            return Err(CustosError::invalid_target(format!(
                "cannot recover to {new_owner}"
            )));
        }
        if self.is_guardian(&new_owner) {
            return Err(CustosError::invalid_target(
                "new owner cannot be a guardian",
            ));
        }
        let executable_after = now.after(policy.recovery_period);
        self.pending_recovery = Some(PendingRecovery {
            new_owner,
            executable_after,
            approvals,
        });
        self.lock = LockState::Locked {
            until: executable_after,
            locker: Locker::Recovery,
        };
        tracing::info!(
            wallet = %self.address,
            %new_owner,
            executable_after,
            "recovery started"
        );
        Ok(executable_after)
    }

    /// Finalize the pending recovery once it is executable.
    ///
    /// Only approvals from current guardians count, against the current majority.
    pub fn finalize_recovery(
        &mut self,
        now: LedgerTime,
        policy: &RecoveryPolicy,
    ) -> Result<RecoveryOutcome> {
        let pending = self
            .pending_recovery
            .as_ref()
            .ok_or(CustosError::NoRecoveryPending {
                wallet: self.address,
            })?;
        if !now.reached(pending.executable_after) {
            return Err(CustosError::RecoveryNotYetExecutable {
                executable_after: pending.executable_after,
            });
        }
        let counted = pending
            .approvals
            .iter()
            .filter(|g| self.guardians.contains(g))
            .count();
        let required = majority(self.guardians.len()).max(1);
        if counted < required {
            return Err(CustosError::insufficient_authorization(format!(
                "recovery has {counted} current guardian approvals, {required} required"
            )));
        }

        let new_owner = pending.new_owner;
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        if policy.clear_guardians {
            self.guardians.clear();
        }
        self.pending_guardian_changes.clear();
        self.pending_recovery = None;
        self.release_recovery_lock();
        tracing::info!(
            wallet = %self.address,
            %previous_owner,
            %new_owner,
            guardians_cleared = policy.clear_guardians,
            "recovery finalized"
        );
        Ok(RecoveryOutcome {
            previous_owner,
            new_owner,
            guardians_cleared: policy.clear_guardians,
        })
    }

    /// Cancel the pending recovery.
    pub fn cancel_recovery(&mut self) -> Result<PendingRecovery> {
        let pending = self
            .pending_recovery
            .take()
            .ok_or(CustosError::NoRecoveryPending {
                wallet: self.address,
            })?;
        self.release_recovery_lock();
        tracing::info!(wallet = %self.address, new_owner = %pending.new_owner, "recovery cancelled");
        Ok(pending)
    }

    fn release_recovery_lock(&mut self) {
        if let LockState::Locked {
            locker: Locker::Recovery,
            ..
        } = self.lock
        {
            self.lock = LockState::Unlocked;
        }
    }
}
