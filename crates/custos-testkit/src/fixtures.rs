//! Wallet fixtures: a relay executor over ledger doubles with one wallet,
//! its owner and guardians.

use custos_authorization::{FilterKind, TradableTokens};
use custos_core::{Address, CustosConfig, FeatureId, GasSchedule, Nonce, Result};
use custos_guardians::WalletRecord;
use custos_relay::{FeatureKind, FeatureRegistry, Operation, RelayExecutor, RelayReceipt, RelayRequest};
use std::sync::Arc;

use crate::keys::TestSigner;
use crate::ledger::RecordingCallExecutor;
use crate::time::ControllableLedgerClock;

pub const RELAYER: Address = Address::repeat_byte(0x7e);
pub const REGISTRY_ADMIN: Address = Address::repeat_byte(0xad);
/// Submitter of relayed requests; also an internal executor
pub const SUBMITTER: Address = Address::repeat_byte(0x5b);
pub const WALLET: Address = Address::repeat_byte(0xaa);

pub const SECURITY_FEATURE: FeatureId = FeatureId(Address::repeat_byte(0xf1));
pub const TRANSACTIONS_FEATURE: FeatureId = FeatureId(Address::repeat_byte(0xf2));
pub const REGISTRIES_FEATURE: FeatureId = FeatureId(Address::repeat_byte(0xf3));

/// Configuration with short periods and an immediate shared registry.
///
/// security period 100s, window 50s, lock 500s, recovery 200s.
pub fn test_config() -> CustosConfig {
    CustosConfig {
        chain_id: 1,
        relayer: RELAYER,
        security_period: 100,
        security_window: 50,
        lock_period: 500,
        recovery_period: 200,
        registry_timelock: 0,
        registry_admin: REGISTRY_ADMIN,
        internal_executors: vec![SUBMITTER],
        aggregator_uniswap_proxy: Address::ZERO,
        clear_guardians_on_recovery: false,
        nonce_block_bound: 100,
        gas: GasSchedule::default(),
    }
}

/// The three standard features.
pub fn standard_features() -> FeatureRegistry {
    [
        (SECURITY_FEATURE, FeatureKind::Security),
        (TRANSACTIONS_FEATURE, FeatureKind::Transactions),
        (REGISTRIES_FEATURE, FeatureKind::Registries),
    ]
    .into_iter()
    .collect()
}

/// Feature id serving `operation` among [`standard_features`].
pub fn feature_for(operation: &Operation) -> FeatureId {
    match operation.feature_kind() {
        FeatureKind::Security => SECURITY_FEATURE,
        FeatureKind::Transactions => TRANSACTIONS_FEATURE,
        FeatureKind::Registries => REGISTRIES_FEATURE,
    }
}

/// Attach signatures by `signers` over the request hash for `relayer`.
pub fn sign_request(mut request: RelayRequest, relayer: Address, signers: &[&TestSigner]) -> RelayRequest {
    let digest = request.hash(relayer).expect("request hashes");
    request.signatures = signers.iter().map(|signer| signer.sign(&digest)).collect();
    request
}

/// Builder for [`WalletFixture`]
pub struct WalletFixtureBuilder {
    guardians: usize,
    config: CustosConfig,
    tokens: TradableTokens,
}

impl WalletFixtureBuilder {
    /// Number of guardians (labelled `guardian-0`, `guardian-1`, ...).
    pub fn guardians(mut self, count: usize) -> Self {
        self.guardians = count;
        self
    }

    pub fn config(mut self, config: CustosConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark `token` tradable.
    pub fn tradable(mut self, token: Address) -> Self {
        self.tokens.insert(token);
        self
    }

    pub async fn build(self) -> WalletFixture {
        let owner = TestSigner::from_label("owner");
        let guardians: Vec<TestSigner> = (0..self.guardians)
            .map(|i| TestSigner::from_label(&format!("guardian-{i}")))
            .collect();
        let clock = ControllableLedgerClock::default();
        let ledger = RecordingCallExecutor::new();
        let executor = RelayExecutor::new(
            self.config,
            standard_features(),
            Arc::new(self.tokens),
            clock.clone(),
            ledger.clone(),
        )
        .expect("test config is valid");

        let record = WalletRecord::create(WALLET, owner.address(), guardians.iter().map(TestSigner::address))
            .expect("fixture wallet is valid")
            .with_feature(SECURITY_FEATURE)
            .with_feature(TRANSACTIONS_FEATURE)
            .with_feature(REGISTRIES_FEATURE);
        executor
            .register_wallet(record)
            .await
            .expect("fixture wallet registers");

        WalletFixture {
            owner,
            guardians,
            clock,
            ledger,
            executor,
        }
    }
}

/// A wallet registered with a relay executor over ledger doubles
pub struct WalletFixture {
    pub owner: TestSigner,
    pub guardians: Vec<TestSigner>,
    pub clock: ControllableLedgerClock,
    pub ledger: RecordingCallExecutor,
    pub executor: RelayExecutor<ControllableLedgerClock, RecordingCallExecutor>,
}

impl WalletFixture {
    pub fn builder() -> WalletFixtureBuilder {
        WalletFixtureBuilder {
            guardians: 0,
            config: test_config(),
            tokens: TradableTokens::default(),
        }
    }

    /// Wallet address.
    pub fn wallet(&self) -> Address {
        WALLET
    }

    /// Current wallet record.
    pub async fn record(&self) -> WalletRecord {
        self.executor.wallet(WALLET).await.expect("fixture wallet exists")
    }

    /// The smallest nonce the wallet accepts at the current block.
    pub async fn next_nonce(&self) -> Nonce {
        let last = self.record().await.last_nonce;
        let block = self.clock.now().block;
        if block > last.block {
            Nonce::new(block, 0)
        } else {
            Nonce::new(last.block, last.counter + 1)
        }
    }

    /// Unsigned request for `operation` with the next nonce.
    pub async fn request(&self, operation: Operation) -> RelayRequest {
        let nonce = self.next_nonce().await;
        RelayRequest::new(
            self.executor.config().chain_id,
            WALLET,
            feature_for(&operation),
            operation,
            nonce,
        )
    }

    /// Sign `request` with `signers`.
    pub fn sign(&self, request: RelayRequest, signers: &[&TestSigner]) -> RelayRequest {
        sign_request(request, self.executor.config().relayer, signers)
    }

    /// Build, sign and relay `operation` in one go.
    pub async fn relay(&self, operation: Operation, signers: &[&TestSigner]) -> Result<RelayReceipt> {
        let request = self.sign(self.request(operation).await, signers);
        self.executor.relay(&request, SUBMITTER).await
    }

    /// Allow `destination` in the shared registry.
    pub async fn allow(&self, destination: Address, filter: Option<FilterKind>) {
        self.executor
            .administer_registry(|registry, now| {
                registry.propose_entry(REGISTRY_ADMIN, destination, filter, now)
            })
            .await
            .expect("registry admin can propose");
    }
}
