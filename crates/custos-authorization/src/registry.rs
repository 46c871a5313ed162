//! Dapp registries
//!
//! A versioned table of `(registry, destination) → entry`. Every write appends an
//! [`EntryVersion`] with the time it takes effect; reads pick the newest version
//! already in effect. Registry 0 is shared and administered by a single admin
//! whose writes are staged behind a timelock. Registries above 0 belong to a
//! wallet and change immediately.

use custos_core::{Address, CustosConfig, CustosError, LedgerTime, RegistryId, Result};
use custos_guardians::WalletRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Validation rule bound to a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    /// ERC-20 `approve` towards a third party only
    OnlyApprove,
    /// Wrapped native token deposits and withdrawals
    Weth,
    /// Uniswap V2 style router swaps
    UniswapV2Router,
    /// Paraswap style aggregator swaps
    Aggregator,
    /// `(beneficiary, amount)` payouts that must pay the wallet
    BeneficiaryTransfer,
}

impl FilterKind {
    /// Stable kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::OnlyApprove => "only-approve",
            FilterKind::Weth => "weth",
            FilterKind::UniswapV2Router => "uniswap-v2-router",
            FilterKind::Aggregator => "aggregator",
            FilterKind::BeneficiaryTransfer => "beneficiary-transfer",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = CustosError;

    fn from_str(s: &str) -> Result<Self> {
        [
            FilterKind::OnlyApprove,
            FilterKind::Weth,
            FilterKind::UniswapV2Router,
            FilterKind::Aggregator,
            FilterKind::BeneficiaryTransfer,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or_else(|| CustosError::invalid(format!("unknown filter: {s}")))
    }
}

/// What a registry says about one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Filter applied to calls; `None` passes every call through
    pub filter: Option<FilterKind>,
    /// Disabled entries authorize nothing
    pub enabled: bool,
}

/// One staged or effective state of an entry. `entry: None` is a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryVersion {
    /// Entry state from `effective_at` on
    pub entry: Option<RegistryEntry>,
    /// Time the version takes effect
    pub effective_at: u64,
}

/// A requested change of the shared registry's timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimelock {
    /// Requested timelock
    pub timelock: u64,
    /// Time the change may be confirmed
    pub effective_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Registry {
    owner: Address,
    entries: BTreeMap<Address, Vec<EntryVersion>>,
}

impl Registry {
    fn new(owner: Address) -> Self {
        Self {
            owner,
            entries: BTreeMap::new(),
        }
    }

    fn effective(&self, destination: &Address, now: LedgerTime) -> Option<RegistryEntry> {
        self.entries
            .get(destination)?
            .iter()
            .rev()
            .find(|v| now.reached(v.effective_at))
            .and_then(|v| v.entry)
    }

    fn stage(&mut self, destination: Address, version: EntryVersion) {
        let versions = self.entries.entry(destination).or_default();
        let at = versions.partition_point(|v| v.effective_at <= version.effective_at);
        versions.insert(at, version);
    }

    // Toggle the entry from `effective_at` on: the version in effect then is
    // copied with the new flag, and every later version takes the flag too.
    fn toggle_from(&mut self, destination: Address, enabled: bool, effective_at: u64) -> Result<()> {
        let versions = self.entries.get_mut(&destination).ok_or_else(|| {
            CustosError::invalid_target(format!("no entry for {destination}"))
        })?;
        let base = versions
            .iter()
            .rev()
            .find(|v| v.effective_at <= effective_at)
            .and_then(|v| v.entry)
            .ok_or_else(|| {
                CustosError::invalid_target(format!(
                    "{destination} is removed by {effective_at}"
                ))
            })?;
        for later in versions.iter_mut().filter(|v| v.effective_at > effective_at) {
            if let Some(entry) = later.entry.as_mut() {
                entry.enabled = enabled;
            }
        }
        self.stage(
            destination,
            EntryVersion {
                entry: Some(RegistryEntry { enabled, ..base }),
                effective_at,
            },
        );
        Ok(())
    }

    fn replace(&mut self, destination: Address, version: EntryVersion) {
        if version.entry.is_some() {
            self.entries.insert(destination, vec![version]);
        } else {
            self.entries.remove(&destination);
        }
    }
}

/// All dapp registries of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DappRegistry {
    admin: Address,
    timelock: u64,
    pending_timelock: Option<PendingTimelock>,
    internal_executors: BTreeSet<Address>,
    #[serde(default)]
    uniswap_proxy: Option<Address>,
    registries: BTreeMap<RegistryId, Registry>,
}

impl DappRegistry {
    /// Create with the shared registry administered by `admin`.
    pub fn new(admin: Address, timelock: u64, internal_executors: impl IntoIterator<Item = Address>) -> Self {
        let mut registries = BTreeMap::new();
        registries.insert(RegistryId::SHARED, Registry::new(admin));
        Self {
            admin,
            timelock,
            pending_timelock: None,
            internal_executors: internal_executors.into_iter().collect(),
            uniswap_proxy: None,
            registries,
        }
    }

    /// Set the uniswap proxy the aggregator delegates `swapOnUniswap*` to.
    pub fn with_uniswap_proxy(mut self, proxy: Option<Address>) -> Self {
        self.uniswap_proxy = proxy.filter(|p| !p.is_zero());
        self
    }

    /// Create from configuration.
    pub fn from_config(config: &CustosConfig) -> Self {
        Self::new(
            config.registry_admin,
            config.registry_timelock,
            config.internal_executors.iter().copied(),
        )
        .with_uniswap_proxy(Some(config.aggregator_uniswap_proxy))
    }

    /// Shared registry administrator.
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Current shared registry timelock.
    pub fn timelock(&self) -> u64 {
        self.timelock
    }

    /// Uniswap proxy the aggregator currently delegates to, if known.
    pub fn uniswap_proxy(&self) -> Option<Address> {
        self.uniswap_proxy
    }

    /// Record a change of the aggregator's uniswap proxy. Admin only.
    pub fn set_uniswap_proxy(&mut self, caller: Address, proxy: Option<Address>) -> Result<()> {
        self.ensure_admin(caller)?;
        self.uniswap_proxy = proxy.filter(|p| !p.is_zero());
        tracing::info!(proxy = ?self.uniswap_proxy, "aggregator uniswap proxy updated");
        Ok(())
    }

    /// Requested timelock change, if any.
    pub fn pending_timelock(&self) -> Option<PendingTimelock> {
        self.pending_timelock
    }

    /// Whether registry `id` exists.
    pub fn exists(&self, id: RegistryId) -> bool {
        self.registries.contains_key(&id)
    }

    /// Owner of registry `id`.
    pub fn registry_owner(&self, id: RegistryId) -> Option<Address> {
        self.registries.get(&id).map(|r| r.owner)
    }

    /// Versions recorded for `(id, destination)`, oldest first.
    pub fn versions(&self, id: RegistryId, destination: &Address) -> &[EntryVersion] {
        self.registries
            .get(&id)
            .and_then(|r| r.entries.get(destination))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Entry in effect for `(id, destination)` at `now`.
    pub fn entry_at(&self, id: RegistryId, destination: &Address, now: LedgerTime) -> Option<RegistryEntry> {
        self.registries.get(&id)?.effective(destination, now)
    }

    /// First entry for `destination` among `wallet`'s enabled registries, in id order.
    pub fn lookup(
        &self,
        wallet: &WalletRecord,
        destination: &Address,
        now: LedgerTime,
    ) -> Option<(RegistryId, RegistryEntry)> {
        wallet
            .enabled_registries
            .iter()
            .find_map(|id| self.entry_at(*id, destination, now).map(|entry| (*id, entry)))
    }

    /// Whether `destination` has an enabled entry for `wallet`.
    pub fn is_enabled_for(&self, wallet: &WalletRecord, destination: &Address, now: LedgerTime) -> bool {
        self.lookup(wallet, destination, now)
            .is_some_and(|(_, entry)| entry.enabled)
    }

    /// Whether `address` may hold a filterless entry.
    pub fn is_internal_executor(&self, address: &Address) -> bool {
        self.internal_executors.contains(address)
    }

    /// Stage a new or replacement shared entry, effective after the timelock.
    pub fn propose_entry(
        &mut self,
        caller: Address,
        destination: Address,
        filter: Option<FilterKind>,
        now: LedgerTime,
    ) -> Result<u64> {
        self.ensure_admin(caller)?;
        self.validate_entry(&destination, filter)?;
        let effective_at = now.after(self.timelock);
        self.shared_mut()?.stage(
            destination,
            EntryVersion {
                entry: Some(RegistryEntry {
                    filter,
                    enabled: true,
                }),
                effective_at,
            },
        );
        tracing::info!(%destination, ?filter, effective_at, "shared registry entry proposed");
        Ok(effective_at)
    }

    /// Compact the versions of a shared entry once every staged change is in effect.
    pub fn confirm_entry(&mut self, destination: Address, now: LedgerTime) -> Result<Option<RegistryEntry>> {
        let shared = self.shared_mut()?;
        let versions = shared.entries.get(&destination).ok_or_else(|| {
            CustosError::invalid_target(format!("no shared registry entry for {destination}"))
        })?;
        if let Some(pending) = versions.iter().find(|v| !now.reached(v.effective_at)) {
            return Err(CustosError::TimelockPending {
                effective_at: pending.effective_at,
            });
        }
        let latest = versions.last().copied().ok_or_else(|| {
            CustosError::invalid_target(format!("no shared registry entry for {destination}"))
        })?;
        shared.replace(destination, latest);
        tracing::info!(%destination, removed = latest.entry.is_none(), "shared registry entry confirmed");
        Ok(latest.entry)
    }

    /// Remove an entry: staged behind the timelock in the shared registry,
    /// immediate elsewhere. Returns the time the removal takes effect.
    pub fn remove_entry(
        &mut self,
        caller: Address,
        id: RegistryId,
        destination: Address,
        now: LedgerTime,
    ) -> Result<u64> {
        if id.is_shared() {
            self.ensure_admin(caller)?;
            let effective_at = now.after(self.timelock);
            let shared = self.shared_mut()?;
            if !shared.entries.contains_key(&destination) {
                return Err(CustosError::invalid_target(format!(
                    "no shared registry entry for {destination}"
                )));
            }
            shared.stage(
                destination,
                EntryVersion {
                    entry: None,
                    effective_at,
                },
            );
            tracing::info!(%destination, effective_at, "shared registry removal proposed");
            return Ok(effective_at);
        }
        let registry = self.owned_mut(caller, id)?;
        if registry.entries.remove(&destination).is_none() {
            return Err(CustosError::invalid_target(format!(
                "no entry for {destination} in {id}"
            )));
        }
        tracing::info!(%id, %destination, "registry entry removed");
        Ok(now.timestamp)
    }

    /// Create a wallet-governed registry owned by `owner`.
    pub fn create_registry(&mut self, owner: Address) -> Result<RegistryId> {
        if owner.is_zero() {
            return Err(CustosError::invalid_target("registry owner must be non-null"));
        }
        let id = (1..=u8::MAX)
            .map(RegistryId)
            .find(|id| !self.registries.contains_key(id))
            .ok_or_else(|| CustosError::invalid("no registry identifiers left"))?;
        self.registries.insert(id, Registry::new(owner));
        tracing::info!(%id, %owner, "registry created");
        Ok(id)
    }

    /// Add or replace an entry of a wallet-governed registry, effective immediately.
    pub fn add_entry(
        &mut self,
        caller: Address,
        id: RegistryId,
        destination: Address,
        filter: Option<FilterKind>,
        now: LedgerTime,
    ) -> Result<()> {
        if id.is_shared() {
            return Err(CustosError::invalid(
                "shared registry entries are staged with propose_entry",
            ));
        }
        self.validate_entry(&destination, filter)?;
        self.owned_mut(caller, id)?.replace(
            destination,
            EntryVersion {
                entry: Some(RegistryEntry {
                    filter,
                    enabled: true,
                }),
                effective_at: now.timestamp,
            },
        );
        tracing::info!(%id, %destination, ?filter, "registry entry added");
        Ok(())
    }

    /// Enable or disable an existing entry.
    ///
    /// Disabling is immediate everywhere and also applies to every staged
    /// version of a shared entry. Re-enabling a shared entry is staged behind
    /// the timelock on top of the newest staged version. Returns the time the
    /// change takes effect.
    pub fn set_entry_enabled(
        &mut self,
        caller: Address,
        id: RegistryId,
        destination: Address,
        enabled: bool,
        now: LedgerTime,
    ) -> Result<u64> {
        let current = self.entry_at(id, &destination, now).ok_or_else(|| {
            CustosError::invalid_target(format!("no effective entry for {destination} in {id}"))
        })?;
        let effective_at = if id.is_shared() {
            self.ensure_admin(caller)?;
            let effective_at = if enabled {
                now.after(self.timelock)
            } else {
                now.timestamp
            };
            self.shared_mut()?
                .toggle_from(destination, enabled, effective_at)?;
            effective_at
        } else {
            self.owned_mut(caller, id)?.replace(
                destination,
                EntryVersion {
                    entry: Some(RegistryEntry { enabled, ..current }),
                    effective_at: now.timestamp,
                },
            );
            now.timestamp
        };
        tracing::info!(%id, %destination, enabled, effective_at, "registry entry toggled");
        Ok(effective_at)
    }

    /// Request a new shared registry timelock, confirmable after the current one.
    pub fn request_timelock_change(&mut self, caller: Address, timelock: u64, now: LedgerTime) -> Result<u64> {
        self.ensure_admin(caller)?;
        let effective_at = now.after(self.timelock);
        self.pending_timelock = Some(PendingTimelock {
            timelock,
            effective_at,
        });
        tracing::info!(timelock, effective_at, "registry timelock change requested");
        Ok(effective_at)
    }

    /// Apply the requested timelock change.
    pub fn confirm_timelock_change(&mut self, now: LedgerTime) -> Result<u64> {
        let pending = self
            .pending_timelock
            .ok_or_else(|| CustosError::invalid_target("no timelock change requested"))?;
        if !now.reached(pending.effective_at) {
            return Err(CustosError::TimelockPending {
                effective_at: pending.effective_at,
            });
        }
        self.timelock = pending.timelock;
        self.pending_timelock = None;
        tracing::info!(timelock = self.timelock, "registry timelock changed");
        Ok(self.timelock)
    }

    /// Enable or disable registry `id` for `wallet`.
    pub fn toggle_registry(&self, wallet: &mut WalletRecord, id: RegistryId, enabled: bool) -> Result<()> {
        if !self.exists(id) {
            return Err(CustosError::invalid_target(format!("{id} does not exist")));
        }
        if enabled {
            wallet.enabled_registries.insert(id);
        } else {
            wallet.enabled_registries.remove(&id);
        }
        tracing::info!(wallet = %wallet.address, %id, enabled, "registry toggled");
        Ok(())
    }

    fn ensure_admin(&self, caller: Address) -> Result<()> {
        if self.admin.is_zero() || caller != self.admin {
            return Err(CustosError::insufficient_authorization(
                "only the registry admin may change the shared registry",
            ));
        }
        Ok(())
    }

    fn validate_entry(&self, destination: &Address, filter: Option<FilterKind>) -> Result<()> {
        if destination.is_zero() {
            return Err(CustosError::invalid_target("destination must be non-null"));
        }
        if filter.is_none() && !self.is_internal_executor(destination) {
            return Err(CustosError::invalid_target(format!(
                "{destination} is not an internal executor and needs a filter"
            )));
        }
        Ok(())
    }

    fn shared_mut(&mut self) -> Result<&mut Registry> {
        self.registries
            .get_mut(&RegistryId::SHARED)
            .ok_or_else(|| CustosError::internal("shared registry missing"))
    }

    fn owned_mut(&mut self, caller: Address, id: RegistryId) -> Result<&mut Registry> {
        let registry = self
            .registries
            .get_mut(&id)
            .ok_or_else(|| CustosError::invalid_target(format!("{id} does not exist")))?;
        if registry.owner != caller {
            return Err(CustosError::insufficient_authorization(format!(
                "{caller} does not govern {id}"
            )));
        }
        Ok(registry)
    }
}
