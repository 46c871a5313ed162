//! Relay executor
//!
//! Every request is applied to a staged copy of the wallet and registries.
//! The staged copy replaces the ledger state only after the ledger has executed
//! every outgoing call, so a rejection at any step leaves no trace: not the
//! nonce, not a guardian change, not a partial call batch.
//!
//! Pipeline for relayed requests:
//!
//! ```text
//! feature ─► nonce ─► signatures + lock ─► operation ─► call filters ─► gas/refund ─► ledger ─► commit
//! ```

use custos_authorization::{
    authorize_call, authorize_calls, recover_signers, required_signers, verify_signers,
    DappRegistry, FilterContext, OperationClass, PolicyContext, SignerRequirement, SignerSet,
    TokenRegistry, NATIVE_TOKEN,
};
use custos_core::{
    Address, CallExecutionEffects, CustosConfig, CustosError, ExternalCall, FeatureId, LedgerTime,
    LedgerTimeEffects, Nonce, PayloadBuilder, Result,
};
use custos_guardians::{GuardianTiming, RecoveryPolicy, WalletRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::features::{FeatureRegistry, OperationContext};
use crate::operation::{FeatureKind, Operation};
use crate::request::RelayRequest;

/// Refund paid to the relay submitter for a relayed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// Refund token; `None` is the native token
    pub token: Option<Address>,
    /// Who receives the refund
    pub recipient: Address,
    /// Amount refunded
    pub amount: u128,
}

impl Refund {
    /// The outgoing call paying the refund.
    pub fn call(&self) -> ExternalCall {
        match self.token {
            None => ExternalCall::transfer(self.recipient, self.amount),
            Some(token) => ExternalCall::new(
                token,
                PayloadBuilder::new("transfer(address,uint256)")
                    .address(self.recipient)
                    .uint(self.amount)
                    .build(),
            ),
        }
    }
}

/// Outcome of an executed or simulated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    pub wallet: Address,
    /// Nonce consumed; `None` for direct calls
    pub nonce: Option<Nonce>,
    pub class: OperationClass,
    /// Gas accounted to the request; zero for direct calls
    pub gas_used: u64,
    pub refund: Option<Refund>,
    /// Outgoing calls handed to the ledger, refund last
    pub calls: Vec<ExternalCall>,
    /// Ledger time the request executed at
    pub executed_at: LedgerTime,
}

/// Wallet records and registries as the ledger holds them
#[derive(Debug, Clone)]
struct LedgerState {
    wallets: HashMap<Address, WalletRecord>,
    registry: DappRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Commit,
    Simulate,
}

/// Work produced on staged state, waiting to be executed and committed
struct Staged {
    wallet: WalletRecord,
    registry: DappRegistry,
    calls: Vec<ExternalCall>,
}

/// Relays and directly executes wallet operations
pub struct RelayExecutor<T, C> {
    config: CustosConfig,
    features: FeatureRegistry,
    tokens: Arc<dyn TokenRegistry>,
    time: T,
    ledger: C,
    state: Mutex<LedgerState>,
}

impl<T, C> RelayExecutor<T, C>
where
    T: LedgerTimeEffects,
    C: CallExecutionEffects,
{
    /// Create an executor with empty ledger state.
    pub fn new(
        config: CustosConfig,
        features: FeatureRegistry,
        tokens: Arc<dyn TokenRegistry>,
        time: T,
        ledger: C,
    ) -> Result<Self> {
        config.validate()?;
        let registry = DappRegistry::from_config(&config);
        Ok(Self {
            config,
            features,
            tokens,
            time,
            ledger,
            state: Mutex::new(LedgerState {
                wallets: HashMap::new(),
                registry,
            }),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &CustosConfig {
        &self.config
    }

    /// Registered features.
    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    /// Add a wallet to the ledger.
    pub async fn register_wallet(&self, wallet: WalletRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.wallets.contains_key(&wallet.address) {
            return Err(CustosError::invalid_target(format!(
                "wallet {} already exists",
                wallet.address
            )));
        }
        tracing::info!(wallet = %wallet.address, owner = %wallet.owner, "wallet registered");
        state.wallets.insert(wallet.address, wallet);
        Ok(())
    }

    /// Snapshot of a wallet record.
    pub async fn wallet(&self, address: Address) -> Result<WalletRecord> {
        let state = self.state.lock().await;
        state
            .wallets
            .get(&address)
            .cloned()
            .ok_or(CustosError::WalletNotFound { wallet: address })
    }

    /// Snapshot of the registries.
    pub async fn registry(&self) -> DappRegistry {
        self.state.lock().await.registry.clone()
    }

    /// Run an administrative change against the registries at the current
    /// ledger time. The change is discarded if `change` fails.
    pub async fn administer_registry<R>(
        &self,
        change: impl FnOnce(&mut DappRegistry, LedgerTime) -> Result<R>,
    ) -> Result<R> {
        let now = self.time.ledger_time().await?;
        let mut state = self.state.lock().await;
        let mut staged = state.registry.clone();
        let out = change(&mut staged, now)?;
        state.registry = staged;
        Ok(out)
    }

    /// Whether `call` would currently be authorized for `wallet`.
    pub async fn check_call(&self, wallet: Address, call: &ExternalCall) -> Result<bool> {
        let now = self.time.ledger_time().await?;
        let state = self.state.lock().await;
        let record = state
            .wallets
            .get(&wallet)
            .ok_or(CustosError::WalletNotFound { wallet })?;
        let ctx = FilterContext {
            wallet: record,
            registry: &state.registry,
            tokens: self.tokens.as_ref(),
            now,
        };
        Ok(authorize_call(&ctx, call).is_ok())
    }

    /// Relay a signed request submitted by `submitter`.
    pub async fn relay(&self, request: &RelayRequest, submitter: Address) -> Result<RelayReceipt> {
        let result = self.process(request, submitter, Mode::Commit).await;
        match &result {
            Ok(receipt) => tracing::info!(
                wallet = %request.wallet,
                nonce = %request.nonce,
                operation = request.operation.name(),
                gas_used = receipt.gas_used,
                calls = receipt.calls.len(),
                "request relayed"
            ),
            Err(err) => tracing::warn!(
                wallet = %request.wallet,
                nonce = %request.nonce,
                operation = request.operation.name(),
                kind = ?err.kind(),
                error = %err,
                "relay rejected"
            ),
        }
        result
    }

    /// Run every check of [`relay`](Self::relay) without executing calls or
    /// changing state.
    pub async fn simulate(&self, request: &RelayRequest, submitter: Address) -> Result<RelayReceipt> {
        self.process(request, submitter, Mode::Simulate).await
    }

    /// Execute an operation called directly by `caller`, who stands in as the
    /// only signer. No nonce is consumed and no refund is paid.
    pub async fn execute(
        &self,
        caller: Address,
        wallet: Address,
        feature: FeatureId,
        operation: &Operation,
    ) -> Result<RelayReceipt> {
        let now = self.time.ledger_time().await?;
        let mut state = self.state.lock().await;
        let current = state
            .wallets
            .get(&wallet)
            .ok_or(CustosError::WalletNotFound { wallet })?;
        let kind = self.features.resolve(current, feature, operation)?;
        let class = operation.class();

        let policy = PolicyContext::for_wallet(current, now, self.config.lock_period);
        let signers = if required_signers(class, &policy) == SignerRequirement::Anyone {
            SignerSet::default()
        } else {
            verify_signers(current, class, &[caller], now, self.config.lock_period)?
        };

        let staged = self.stage(current.clone(), &state.registry, kind, operation, &signers, now)?;
        let receipt = RelayReceipt {
            wallet,
            nonce: None,
            class,
            gas_used: 0,
            refund: None,
            calls: staged.calls.clone(),
            executed_at: now,
        };
        self.commit(&mut state, staged).await?;
        tracing::info!(%wallet, %caller, operation = operation.name(), "direct call executed");
        Ok(receipt)
    }

    async fn process(&self, request: &RelayRequest, submitter: Address, mode: Mode) -> Result<RelayReceipt> {
        if request.chain_id != self.config.chain_id {
            return Err(CustosError::invalid(format!(
                "request for chain {} relayed on chain {}",
                request.chain_id, self.config.chain_id
            )));
        }
        let digest = request.hash(self.config.relayer)?;
        let now = self.time.ledger_time().await?;
        let mut state = self.state.lock().await;

        let current = state
            .wallets
            .get(&request.wallet)
            .ok_or(CustosError::WalletNotFound {
                wallet: request.wallet,
            })?;
        let kind = self
            .features
            .resolve(current, request.feature, &request.operation)?;

        let mut wallet = current.clone();
        wallet.reserve_nonce(request.nonce, now, self.config.nonce_block_bound)?;

        let class = request.operation.class();
        let signers = recover_signers(&digest, &request.signatures)?;
        let signer_set = verify_signers(&wallet, class, &signers, now, self.config.lock_period)?;

        let mut staged = self.stage(wallet, &state.registry, kind, &request.operation, &signer_set, now)?;

        let refund_calls = usize::from(request.gas_price > 0);
        let gas_used = self
            .config
            .gas
            .gas_used(request.signatures.len(), staged.calls.len() + refund_calls);
        if gas_used > request.gas_limit {
            return Err(CustosError::GasLimitExceeded {
                required: gas_used,
                limit: request.gas_limit,
            });
        }

        let refund = self.refund(request, submitter, gas_used, &signer_set)?;
        if let Some(refund) = &refund {
            let call = refund.call();
            let ctx = FilterContext {
                wallet: &staged.wallet,
                registry: &staged.registry,
                tokens: self.tokens.as_ref(),
                now,
            };
            authorize_call(&ctx, &call)?;
            staged.calls.push(call);
        }

        let receipt = RelayReceipt {
            wallet: request.wallet,
            nonce: Some(request.nonce),
            class,
            gas_used,
            refund,
            calls: staged.calls.clone(),
            executed_at: now,
        };
        if mode == Mode::Commit {
            self.commit(&mut state, staged).await?;
        }
        Ok(receipt)
    }

    /// Apply `operation` to staged copies and authorize the calls it issues.
    fn stage(
        &self,
        mut wallet: WalletRecord,
        registry: &DappRegistry,
        kind: FeatureKind,
        operation: &Operation,
        signers: &SignerSet,
        now: LedgerTime,
    ) -> Result<Staged> {
        let mut registry = registry.clone();
        let calls = kind.execute(
            &mut OperationContext {
                wallet: &mut wallet,
                registry: &mut registry,
                signers,
                now,
                timing: GuardianTiming::from(&self.config),
                recovery: RecoveryPolicy::from(&self.config),
            },
            operation,
        )?;
        let ctx = FilterContext {
            wallet: &wallet,
            registry: &registry,
            tokens: self.tokens.as_ref(),
            now,
        };
        authorize_calls(&ctx, &calls)?;
        Ok(Staged {
            wallet,
            registry,
            calls,
        })
    }

    fn refund(
        &self,
        request: &RelayRequest,
        submitter: Address,
        gas_used: u64,
        signers: &SignerSet,
    ) -> Result<Option<Refund>> {
        if request.gas_price == 0 {
            return Ok(None);
        }
        if signers.is_empty() {
            return Err(CustosError::insufficient_authorization(
                "a refund must be approved by at least one wallet signer",
            ));
        }
        let amount = u128::from(gas_used)
            .checked_mul(request.gas_price)
            .ok_or_else(|| CustosError::invalid("refund amount overflows"))?;
        let token = request.refund_token.filter(|token| *token != NATIVE_TOKEN);
        Ok(Some(Refund {
            token,
            recipient: request.refund_recipient.unwrap_or(submitter),
            amount,
        }))
    }

    async fn commit(&self, state: &mut LedgerState, staged: Staged) -> Result<()> {
        if !staged.calls.is_empty() {
            self.ledger
                .execute_batch(staged.wallet.address, &staged.calls)
                .await?;
        }
        state.wallets.insert(staged.wallet.address, staged.wallet);
        state.registry = staged.registry;
        Ok(())
    }
}
