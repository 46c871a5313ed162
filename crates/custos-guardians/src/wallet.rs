//! Per-wallet authorization record.

use custos_core::{Address, CustosError, FeatureId, LedgerTime, Nonce, RegistryId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Number of guardians forming a majority of `guardian_count` (⌈g/2⌉).
pub fn majority(guardian_count: usize) -> usize {
    guardian_count.div_ceil(2)
}

/// Collection wrapper around the unique, unordered guardian identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianSet {
    guardians: BTreeSet<Address>,
}

impl GuardianSet {
    /// Create from identities; duplicates collapse.
    pub fn new(guardians: impl IntoIterator<Item = Address>) -> Self {
        Self {
            guardians: guardians.into_iter().collect(),
        }
    }

    /// Number of guardians.
    pub fn len(&self) -> usize {
        self.guardians.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.guardians.is_empty()
    }

    /// Whether `address` is a guardian.
    pub fn contains(&self, address: &Address) -> bool {
        self.guardians.contains(address)
    }

    /// Iterate over guardians in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.guardians.iter()
    }

    /// Majority of the current set.
    pub fn majority(&self) -> usize {
        majority(self.len())
    }

    pub(crate) fn insert(&mut self, guardian: Address) -> bool {
        self.guardians.insert(guardian)
    }

    pub(crate) fn remove(&mut self, guardian: &Address) -> bool {
        self.guardians.remove(guardian)
    }

    pub(crate) fn clear(&mut self) {
        self.guardians.clear();
    }
}

impl<'a> IntoIterator for &'a GuardianSet {
    type Item = &'a Address;
    type IntoIter = std::collections::btree_set::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.guardians.iter()
    }
}

/// Who placed a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locker {
    /// The wallet owner
    Owner,
    /// A specific guardian
    Guardian(Address),
    /// A pending recovery; only recovery finalize/cancel release it
    Recovery,
}

/// Stored lock state. Expiry is evaluated lazily against ledger time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// Not locked
    #[default]
    Unlocked,
    /// Locked until `until` (exclusive)
    Locked {
        /// Expiry timestamp
        until: u64,
        /// Entity holding the lock
        locker: Locker,
    },
}

impl LockState {
    /// The lock in force at `now`, if any.
    pub fn active(&self, now: LedgerTime) -> Option<(u64, Locker)> {
        match *self {
            LockState::Locked { until, locker } if now.timestamp < until => Some((until, locker)),
            _ => None,
        }
    }

    /// Whether a lock is in force at `now`.
    pub fn is_locked(&self, now: LedgerTime) -> bool {
        self.active(now).is_some()
    }
}

/// Kind of guardian-set change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardianChangeOp {
    /// Add the guardian
    Add,
    /// Revoke the guardian
    Revoke,
}

/// A guardian-set change waiting for its security period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGuardianChange {
    /// Guardian being added or revoked
    pub guardian: Address,
    /// Requested change
    pub op: GuardianChangeOp,
    /// Earliest confirmation time
    pub eligible_at: u64,
}

/// The single in-flight ownership recovery of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecovery {
    /// Proposed new owner
    pub new_owner: Address,
    /// Earliest finalization time
    pub executable_after: u64,
    /// Guardians that signed the start request
    pub approvals: BTreeSet<Address>,
}

/// Everything the authorization core stores for one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Wallet identity
    pub address: Address,
    /// Current owner
    pub owner: Address,
    /// Current guardians
    pub guardians: GuardianSet,
    /// Lock state
    pub lock: LockState,
    /// Highest nonce consumed by a relayed request
    pub last_nonce: Nonce,
    /// At most one pending change per guardian
    pub pending_guardian_changes: BTreeMap<Address, PendingGuardianChange>,
    /// At most one pending recovery
    pub pending_recovery: Option<PendingRecovery>,
    /// Features authorized to act on the wallet
    pub features: BTreeSet<FeatureId>,
    /// Dapp registries consulted for outgoing calls
    pub enabled_registries: BTreeSet<RegistryId>,
}

impl WalletRecord {
    /// Create a wallet with an owner and an initial guardian set.
    ///
    /// The shared registry is enabled by default.
    pub fn create(
        address: Address,
        owner: Address,
        guardians: impl IntoIterator<Item = Address>,
    ) -> Result<Self> {
        if address.is_zero() || owner.is_zero() {
            return Err(CustosError::invalid_target(
                "wallet and owner must be non-null",
            ));
        }
        if owner == address {
            return Err(CustosError::invalid_target("wallet cannot own itself"));
        }
        let guardians = GuardianSet::new(guardians);
        if guardians.contains(&owner) || guardians.iter().any(Address::is_zero) {
            return Err(CustosError::invalid_target(
                "guardians must be non-null and distinct from the owner",
            ));
        }
        Ok(Self {
            address,
            owner,
            guardians,
            lock: LockState::Unlocked,
            last_nonce: Nonce::default(),
            pending_guardian_changes: BTreeMap::new(),
            pending_recovery: None,
            features: BTreeSet::new(),
            enabled_registries: BTreeSet::from([RegistryId::SHARED]),
        })
    }

    /// Authorize a feature.
    pub fn with_feature(mut self, feature: FeatureId) -> Self {
        self.features.insert(feature);
        self
    }

    /// Whether `feature` is authorized for this wallet.
    pub fn has_feature(&self, feature: &FeatureId) -> bool {
        self.features.contains(feature)
    }

    /// Whether `address` is the owner.
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owner == *address
    }

    /// Whether `address` is a current guardian.
    pub fn is_guardian(&self, address: &Address) -> bool {
        self.guardians.contains(address)
    }

    /// Fail with `WalletLocked` if a lock is in force at `now`.
    pub fn ensure_unlocked(&self, now: LedgerTime) -> Result<()> {
        match self.lock.active(now) {
            Some((until, _)) => Err(CustosError::WalletLocked {
                wallet: self.address,
                until,
            }),
            None => Ok(()),
        }
    }

    /// Transfer ownership outside recovery.
    ///
    /// The new owner must be non-null, differ from the current owner and not be a
    /// guardian; the wallet must be unlocked.
    pub fn transfer_ownership(&mut self, new_owner: Address, now: LedgerTime) -> Result<()> {
        self.ensure_unlocked(now)?;
        if new_owner.is_zero() || new_owner == self.owner || new_owner == self.address {
            return Err(CustosError::invalid_target(format!(
                "cannot transfer ownership to {new_owner}"
            )));
        }
        if self.is_guardian(&new_owner) {
            return Err(CustosError::invalid_target(
                "new owner cannot be a guardian",
            ));
        }
        tracing::info!(wallet = %self.address, owner = %new_owner, "ownership transferred");
        self.owner = new_owner;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_majority_is_ceiling_half() {
        assert_eq!(majority(0), 0);
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 1);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 2);
        assert_eq!(majority(5), 3);
    }

    #[test]
    fn test_create_validates_identities() {
        assert!(WalletRecord::create(addr(1), addr(2), [addr(3)]).is_ok());
        assert_matches!(
            WalletRecord::create(addr(1), Address::ZERO, []),
            Err(CustosError::InvalidTarget { .. })
        );
        assert_matches!(
            WalletRecord::create(addr(1), addr(2), [addr(2)]),
            Err(CustosError::InvalidTarget { .. })
        );
    }

    #[test]
    fn test_shared_registry_enabled_by_default() {
        let wallet = WalletRecord::create(addr(1), addr(2), []).unwrap();
        assert!(wallet.enabled_registries.contains(&RegistryId::SHARED));
        assert!(wallet.guardians.is_empty());
    }

    #[test]
    fn test_lock_expires_lazily() {
        let lock = LockState::Locked {
            until: 10,
            locker: Locker::Owner,
        };
        assert!(lock.is_locked(LedgerTime::new(0, 9)));
        assert!(!lock.is_locked(LedgerTime::new(0, 10)));
    }

    #[test]
    fn test_transfer_ownership_rules() {
        let mut wallet = WalletRecord::create(addr(1), addr(2), [addr(3)]).unwrap();
        let now = LedgerTime::new(1, 1);
        assert_matches!(
            wallet.transfer_ownership(addr(3), now),
            Err(CustosError::InvalidTarget { .. })
        );
        assert_matches!(
            wallet.transfer_ownership(addr(2), now),
            Err(CustosError::InvalidTarget { .. })
        );
        wallet.lock = LockState::Locked {
            until: 5,
            locker: Locker::Owner,
        };
        assert_matches!(
            wallet.transfer_ownership(addr(4), now),
            Err(CustosError::WalletLocked { until: 5, .. })
        );
        wallet.transfer_ownership(addr(4), LedgerTime::new(2, 5)).unwrap();
        assert_eq!(wallet.owner, addr(4));
    }
}
