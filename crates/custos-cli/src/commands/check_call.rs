//! `custos check-call`: evaluate a call against a registry scenario
//!
//! ```toml
//! wallet = "0xaaaa..."
//! owner = "0x1111..."
//! tradable = ["0x7070..."]
//!
//! [[entries]]
//! destination = "0xdada..."
//! filter = "only-approve"
//!
//! [call]
//! to = "0x7070..."
//! data = "0x095ea7b3..."
//! ```
//!
//! Entries are placed in the shared registry and are in effect immediately.

use anyhow::{Context, Result};
use custos_authorization::{recover_spender, FilterKind, TradableTokens};
use custos_core::{Address, CustosConfig, ExternalCall};
use custos_guardians::WalletRecord;
use custos_relay::{FeatureRegistry, RelayExecutor};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::common::read_file;
use crate::effects::{OfflineLedger, WallClock};

/// Administers the scenario's shared registry
const SCENARIO_ADMIN: Address = Address::repeat_byte(0xad);

#[derive(Debug, Deserialize)]
struct Scenario {
    wallet: Address,
    owner: Address,
    #[serde(default)]
    tradable: Vec<Address>,
    #[serde(default)]
    entries: Vec<ScenarioEntry>,
    call: ScenarioCall,
}

#[derive(Debug, Deserialize)]
struct ScenarioEntry {
    destination: Address,
    filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScenarioCall {
    to: Address,
    #[serde(default)]
    value: u64,
    #[serde(default)]
    data: String,
}

impl ScenarioCall {
    fn to_call(&self) -> Result<ExternalCall> {
        let digits = self.data.strip_prefix("0x").unwrap_or(&self.data);
        let data = hex::decode(digits).context("call data is not hex")?;
        Ok(ExternalCall::new(self.to, data).with_value(u128::from(self.value)))
    }
}

/// Outcome of a scenario check
#[derive(Debug, Clone, PartialEq, Eq)]
struct Verdict {
    spender: Address,
    authorized: bool,
}

pub async fn run(config: &CustosConfig, path: &Path) -> Result<()> {
    let scenario: Scenario = toml::from_str(&read_file(path)?)
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    let verdict = evaluate(config, &scenario).await?;
    println!("spender    {}", verdict.spender);
    println!(
        "verdict    {}",
        if verdict.authorized { "authorized" } else { "denied" }
    );
    Ok(())
}

async fn evaluate(config: &CustosConfig, scenario: &Scenario) -> Result<Verdict> {
    let mut config = config.clone();
    config.registry_admin = SCENARIO_ADMIN;
    config.registry_timelock = 0;

    let executor = RelayExecutor::new(
        config,
        FeatureRegistry::new(),
        Arc::new(TradableTokens::new(scenario.tradable.iter().copied())),
        WallClock { block: 0 },
        OfflineLedger,
    )?;
    executor
        .register_wallet(WalletRecord::create(scenario.wallet, scenario.owner, [])?)
        .await?;
    for entry in &scenario.entries {
        let filter = entry
            .filter
            .as_deref()
            .map(str::parse::<FilterKind>)
            .transpose()?;
        executor
            .administer_registry(|registry, now| {
                registry.propose_entry(SCENARIO_ADMIN, entry.destination, filter, now)
            })
            .await
            .with_context(|| format!("registering {}", entry.destination))?;
    }

    let call = scenario.call.to_call()?;
    let authorized = executor.check_call(scenario.wallet, &call).await?;
    Ok(Verdict {
        spender: recover_spender(call.to, &call.data),
        authorized,
    })
}
