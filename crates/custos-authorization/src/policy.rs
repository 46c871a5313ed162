//! Signature policy matrix
//!
//! Which signers a request needs is a pure function of the operation class and
//! the wallet's state ([`required_signers`]). Verification is kept separate: it
//! recovers identities from signatures, classifies them against the wallet, and
//! only then compares the result with the requirement. Changing the matrix never
//! touches signature code.

use custos_core::crypto::recover_signer;
use custos_core::{Address, CustosError, LedgerTime, RecoverableSignature, Result};
use custos_guardians::{majority, Locker, WalletRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Classification of a requested operation for signature purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationClass {
    /// Ordinary feature call
    Ordinary,
    /// Feature call bypassing a timelocked path
    GuardianApproved,
    Lock,
    Unlock,
    GuardianAdd,
    GuardianRevoke,
    GuardianConfirm,
    GuardianCancel,
    RecoveryStart,
    RecoveryFinalize,
    RecoveryCancel,
    /// Registry toggles and wallet-governed registry edits
    RegistryManagement,
}

impl OperationClass {
    /// Every class, in matrix order.
    pub const ALL: [OperationClass; 12] = [
        OperationClass::Ordinary,
        OperationClass::GuardianApproved,
        OperationClass::Lock,
        OperationClass::Unlock,
        OperationClass::GuardianAdd,
        OperationClass::GuardianRevoke,
        OperationClass::GuardianConfirm,
        OperationClass::GuardianCancel,
        OperationClass::RecoveryStart,
        OperationClass::RecoveryFinalize,
        OperationClass::RecoveryCancel,
        OperationClass::RegistryManagement,
    ];

    /// Whether the class may run while the wallet is locked.
    pub fn allowed_while_locked(self) -> bool {
        matches!(
            self,
            OperationClass::Lock
                | OperationClass::Unlock
                | OperationClass::GuardianCancel
                | OperationClass::RecoveryStart
                | OperationClass::RecoveryFinalize
                | OperationClass::RecoveryCancel
        )
    }

    /// Stable kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationClass::Ordinary => "ordinary",
            OperationClass::GuardianApproved => "guardian-approved",
            OperationClass::Lock => "lock",
            OperationClass::Unlock => "unlock",
            OperationClass::GuardianAdd => "guardian-add",
            OperationClass::GuardianRevoke => "guardian-revoke",
            OperationClass::GuardianConfirm => "guardian-confirm",
            OperationClass::GuardianCancel => "guardian-cancel",
            OperationClass::RecoveryStart => "recovery-start",
            OperationClass::RecoveryFinalize => "recovery-finalize",
            OperationClass::RecoveryCancel => "recovery-cancel",
            OperationClass::RegistryManagement => "registry-management",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationClass {
    type Err = CustosError;

    fn from_str(s: &str) -> Result<Self> {
        OperationClass::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| CustosError::invalid(format!("unknown operation class: {s}")))
    }
}

/// Wallet state the matrix depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyContext {
    /// Number of current guardians
    pub guardian_count: usize,
    /// Whether a lock is in force
    pub locked: bool,
    /// Whether the pending recovery (if any) has been abandoned by its guardians
    pub recovery_abandoned: bool,
}

impl PolicyContext {
    /// Snapshot the context of `wallet` at `now`.
    pub fn for_wallet(wallet: &WalletRecord, now: LedgerTime, lock_period: u64) -> Self {
        Self {
            guardian_count: wallet.guardians.len(),
            locked: wallet.lock.is_locked(now),
            recovery_abandoned: wallet
                .pending_recovery
                .as_ref()
                .is_some_and(|r| r.is_abandoned(now, lock_period)),
        }
    }
}

/// Description of the signer set an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerRequirement {
    /// No signature needed
    Anyone,
    /// The owner
    Owner,
    /// The owner or any one guardian
    OwnerOrGuardian,
    /// The owner plus at least this many guardians
    OwnerAndGuardians(usize),
    /// At least this many guardians; an owner co-signature is not counted
    Guardians(usize),
    /// Not permitted in the current state
    Blocked,
}

impl SignerRequirement {
    /// Whether `signers` satisfies the requirement.
    pub fn is_satisfied_by(&self, signers: &SignerSet) -> bool {
        let guardians = signers.guardians.len();
        match *self {
            SignerRequirement::Anyone => true,
            SignerRequirement::Owner => signers.owner,
            SignerRequirement::OwnerOrGuardian => signers.owner || guardians > 0,
            SignerRequirement::OwnerAndGuardians(n) => signers.owner && guardians >= n,
            SignerRequirement::Guardians(n) => guardians >= n,
            SignerRequirement::Blocked => false,
        }
    }
}

impl fmt::Display for SignerRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerRequirement::Anyone => f.write_str("anyone"),
            SignerRequirement::Owner => f.write_str("owner"),
            SignerRequirement::OwnerOrGuardian => f.write_str("owner or any guardian"),
            SignerRequirement::OwnerAndGuardians(0) => f.write_str("owner"),
            SignerRequirement::OwnerAndGuardians(n) => write!(f, "owner + {n} guardian(s)"),
            SignerRequirement::Guardians(n) => write!(f, "{n} guardian(s)"),
            SignerRequirement::Blocked => f.write_str("blocked while locked"),
        }
    }
}

/// Required signer set for `class` in `ctx`. Majority is ⌈g/2⌉.
pub fn required_signers(class: OperationClass, ctx: &PolicyContext) -> SignerRequirement {
    if ctx.locked && !class.allowed_while_locked() {
        return SignerRequirement::Blocked;
    }
    let g = ctx.guardian_count;
    match class {
        OperationClass::Ordinary
        | OperationClass::GuardianAdd
        | OperationClass::GuardianCancel
        | OperationClass::RegistryManagement => SignerRequirement::Owner,
        OperationClass::GuardianApproved if g == 0 => SignerRequirement::Owner,
        OperationClass::GuardianApproved => SignerRequirement::OwnerAndGuardians(1),
        OperationClass::Lock | OperationClass::Unlock => SignerRequirement::OwnerOrGuardian,
        OperationClass::GuardianRevoke => SignerRequirement::OwnerAndGuardians(majority(g)),
        OperationClass::RecoveryStart => SignerRequirement::Guardians(majority(g).max(1)),
        OperationClass::RecoveryCancel if ctx.recovery_abandoned => SignerRequirement::Owner,
        OperationClass::RecoveryCancel => SignerRequirement::OwnerAndGuardians(majority(g)),
        OperationClass::RecoveryFinalize | OperationClass::GuardianConfirm => {
            SignerRequirement::Anyone
        }
    }
}

/// Recovered signers classified against a wallet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerSet {
    /// Whether the owner signed
    pub owner: bool,
    /// Guardians that signed
    pub guardians: BTreeSet<Address>,
}

impl SignerSet {
    /// Number of distinct signers.
    pub fn len(&self) -> usize {
        usize::from(self.owner) + self.guardians.len()
    }

    /// Whether nobody signed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock holder implied by this signer set: the owner if present, else the
    /// lowest guardian.
    pub fn locker(&self) -> Option<Locker> {
        if self.owner {
            return Some(Locker::Owner);
        }
        self.guardians.iter().next().copied().map(Locker::Guardian)
    }
}

/// Classify `signers` as owner or guardians of `wallet`.
///
/// Duplicates fail with `InvalidSignature`; identities that are neither owner nor
/// guardian fail with `UnknownSigner`.
pub fn classify_signers(wallet: &WalletRecord, signers: &[Address]) -> Result<SignerSet> {
    let mut seen = BTreeSet::new();
    let mut set = SignerSet::default();
    for signer in signers {
        if !seen.insert(*signer) {
            return Err(CustosError::invalid_signature(format!(
                "duplicate signature from {signer}"
            )));
        }
        if wallet.is_owner(signer) {
            set.owner = true;
        } else if wallet.is_guardian(signer) {
            set.guardians.insert(*signer);
        } else {
            return Err(CustosError::UnknownSigner { signer: *signer });
        }
    }
    Ok(set)
}

/// Recover the signer of every signature over `digest`.
pub fn recover_signers(digest: &[u8; 32], signatures: &[RecoverableSignature]) -> Result<Vec<Address>> {
    signatures
        .iter()
        .map(|sig| recover_signer(digest, sig))
        .collect()
}

/// Check already-recovered `signers` against the policy for `class`.
///
/// Direct calls pass the caller as a one-element signer list.
pub fn verify_signers(
    wallet: &WalletRecord,
    class: OperationClass,
    signers: &[Address],
    now: LedgerTime,
    lock_period: u64,
) -> Result<SignerSet> {
    let set = classify_signers(wallet, signers)?;
    let ctx = PolicyContext::for_wallet(wallet, now, lock_period);
    let requirement = required_signers(class, &ctx);
    tracing::debug!(
        wallet = %wallet.address,
        %class,
        %requirement,
        owner = set.owner,
        guardians = set.guardians.len(),
        "evaluating signer policy"
    );
    if requirement == SignerRequirement::Blocked {
        let until = wallet.lock.active(now).map_or(now.timestamp, |(until, _)| until);
        return Err(CustosError::WalletLocked {
            wallet: wallet.address,
            until,
        });
    }
    if !requirement.is_satisfied_by(&set) {
        return Err(CustosError::insufficient_authorization(format!(
            "{class} requires {requirement}; got owner={} guardians={}",
            set.owner,
            set.guardians.len()
        )));
    }
    Ok(set)
}

/// Recover signers from `signatures` over `digest` and check them against the
/// policy for `class`.
pub fn verify_signatures(
    wallet: &WalletRecord,
    class: OperationClass,
    digest: &[u8; 32],
    signatures: &[RecoverableSignature],
    now: LedgerTime,
    lock_period: u64,
) -> Result<SignerSet> {
    let signers = recover_signers(digest, signatures)?;
    verify_signers(wallet, class, &signers, now, lock_period)
}
