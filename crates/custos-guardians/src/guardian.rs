//! Guardian/lock state machine
//!
//! Transitions assume the caller has already been authorized for the operation
//! class; they enforce only state and timing rules. Guardian-set changes go
//! through a security period, then stay confirmable for a bounded window:
//!
//! ```text
//!   propose(T) ──► pending ──[T+period, T+period+window]──► confirm ──► applied
//!                     │                                   (outside: lapsed)
//!                     └── cancel ──► discarded
//! ```

use custos_core::{Address, CustosError, LedgerTime, Result};

use crate::wallet::{GuardianChangeOp, LockState, Locker, PendingGuardianChange, WalletRecord};

/// Timing parameters of the guardian/lock state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardianTiming {
    /// Delay before a guardian change becomes confirmable
    pub security_period: u64,
    /// Interval during which a matured change stays confirmable
    pub security_window: u64,
    /// Duration of a lock
    pub lock_period: u64,
}

impl From<&custos_core::CustosConfig> for GuardianTiming {
    fn from(config: &custos_core::CustosConfig) -> Self {
        Self {
            security_period: config.security_period,
            security_window: config.security_window,
            lock_period: config.lock_period,
        }
    }
}

impl WalletRecord {
    /// Lock the wallet for `lock_period` from `now`, or extend an existing lock.
    ///
    /// Extension never shortens the expiry and leaves the lock with whoever
    /// placed it. A recovery-held lock cannot be taken over.
    pub fn lock(&mut self, locker: Locker, now: LedgerTime, timing: &GuardianTiming) -> Result<u64> {
        if locker == Locker::Recovery {
            return Err(CustosError::invalid_target(
                "recovery locks are placed by recovery start",
            ));
        }
        let mut until = now.after(timing.lock_period);
        let mut holder = locker;
        if let Some((current, placed_by)) = self.lock.active(now) {
            if placed_by == Locker::Recovery {
                return Err(CustosError::WalletLocked {
                    wallet: self.address,
                    until: current,
                });
            }
            until = until.max(current);
            holder = placed_by;
        }
        self.lock = LockState::Locked {
            until,
            locker: holder,
        };
        tracing::info!(wallet = %self.address, until, ?locker, ?holder, "wallet locked");
        Ok(until)
    }

    /// Release a lock before expiry.
    ///
    /// The owner may release any owner/guardian lock; a guardian only its own.
    pub fn unlock(&mut self, requester: Locker, now: LedgerTime) -> Result<()> {
        let Some((until, holder)) = self.lock.active(now) else {
            return Err(CustosError::invalid_target("wallet is not locked"));
        };
        match (holder, requester) {
            (Locker::Recovery, _) => {
                return Err(CustosError::WalletLocked {
                    wallet: self.address,
                    until,
                })
            }
            (_, Locker::Owner) => {}
            (Locker::Guardian(a), Locker::Guardian(b)) if a == b => {}
            _ => {
                return Err(CustosError::insufficient_authorization(
                    "only the owner or the locking guardian may unlock",
                ))
            }
        }
        self.lock = LockState::Unlocked;
        tracing::info!(wallet = %self.address, ?requester, "wallet unlocked");
        Ok(())
    }

    /// Stage the addition of `guardian`; overwrites any pending change for it.
    pub fn propose_guardian_addition(
        &mut self,
        guardian: Address,
        now: LedgerTime,
        timing: &GuardianTiming,
    ) -> Result<u64> {
        self.check_addable(&guardian)?;
        Ok(self.stage_change(guardian, GuardianChangeOp::Add, now, timing))
    }

    /// Stage the revocation of `guardian`; overwrites any pending change for it.
    pub fn propose_guardian_revocation(
        &mut self,
        guardian: Address,
        now: LedgerTime,
        timing: &GuardianTiming,
    ) -> Result<u64> {
        self.check_revocable(&guardian)?;
        Ok(self.stage_change(guardian, GuardianChangeOp::Revoke, now, timing))
    }

    /// Apply the pending change for `guardian` if `now` lies in its window.
    pub fn confirm_guardian_change(
        &mut self,
        guardian: Address,
        now: LedgerTime,
        timing: &GuardianTiming,
    ) -> Result<GuardianChangeOp> {
        let pending = self.pending_guardian_changes.get(&guardian).copied().ok_or_else(|| {
            CustosError::guardian_change_not_eligible(format!("no pending change for {guardian}"))
        })?;
        let closes_at = pending.eligible_at.saturating_add(timing.security_window);
        if now.timestamp < pending.eligible_at {
            return Err(CustosError::guardian_change_not_eligible(format!(
                "change for {guardian} confirmable from {}",
                pending.eligible_at
            )));
        }
        if now.timestamp > closes_at {
            return Err(CustosError::guardian_change_not_eligible(format!(
                "confirmation window for {guardian} closed at {closes_at}"
            )));
        }
        match pending.op {
            GuardianChangeOp::Add => {
                self.check_addable(&guardian)?;
                self.guardians.insert(guardian);
            }
            GuardianChangeOp::Revoke => {
                self.check_revocable(&guardian)?;
                self.guardians.remove(&guardian);
            }
        }
        self.pending_guardian_changes.remove(&guardian);
        tracing::info!(
            wallet = %self.address,
            %guardian,
            op = ?pending.op,
            guardians = self.guardians.len(),
            "guardian change confirmed"
        );
        Ok(pending.op)
    }

    /// Discard the pending change for `guardian`.
    pub fn cancel_guardian_change(&mut self, guardian: Address) -> Result<PendingGuardianChange> {
        let pending = self.pending_guardian_changes.remove(&guardian).ok_or_else(|| {
            CustosError::guardian_change_not_eligible(format!("no pending change for {guardian}"))
        })?;
        tracing::info!(wallet = %self.address, %guardian, op = ?pending.op, "guardian change cancelled");
        Ok(pending)
    }

    fn stage_change(
        &mut self,
        guardian: Address,
        op: GuardianChangeOp,
        now: LedgerTime,
        timing: &GuardianTiming,
    ) -> u64 {
        let eligible_at = now.after(timing.security_period);
        self.pending_guardian_changes.insert(
            guardian,
            PendingGuardianChange {
                guardian,
                op,
                eligible_at,
            },
        );
        tracing::info!(wallet = %self.address, %guardian, ?op, eligible_at, "guardian change proposed");
        eligible_at
    }

    fn check_addable(&self, guardian: &Address) -> Result<()> {
        if guardian.is_zero() || *guardian == self.address {
            return Err(CustosError::invalid_target(format!(
                "{guardian} cannot be a guardian"
            )));
        }
        if self.is_owner(guardian) {
            return Err(CustosError::invalid_target("owner cannot be a guardian"));
        }
        if self.is_guardian(guardian) {
            return Err(CustosError::invalid_target(format!(
                "{guardian} is already a guardian"
            )));
        }
        Ok(())
    }

    fn check_revocable(&self, guardian: &Address) -> Result<()> {
        if !self.is_guardian(guardian) {
            return Err(CustosError::invalid_target(format!(
                "{guardian} is not a guardian"
            )));
        }
        Ok(())
    }
}
