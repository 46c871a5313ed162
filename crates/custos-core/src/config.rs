//! Custos configuration
//!
//! Loaded from TOML, overlaid with `CUSTOS_*` environment variables, then
//! validated. All periods are in seconds of ledger time.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{CustosError, Result};
use crate::identifiers::Address;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CUSTOS_";

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Gas accounting schedule for relayed requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Fixed cost of every relayed request
    pub base: u64,
    /// Cost per verified signature
    pub per_signature: u64,
    /// Cost per outgoing call, refund transfer included
    pub per_call: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            base: 21_000,
            per_signature: 5_000,
            per_call: 10_000,
        }
    }
}

impl GasSchedule {
    /// Gas charged for a request with `signatures` signatures issuing `calls` calls.
    pub fn gas_used(&self, signatures: usize, calls: usize) -> u64 {
        self.base
            .saturating_add(self.per_signature.saturating_mul(signatures as u64))
            .saturating_add(self.per_call.saturating_mul(calls as u64))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustosConfig {
    /// Chain the relay executes on; bound into every request hash
    pub chain_id: u64,
    /// Identity of the relay executor; bound into every request hash
    pub relayer: Address,
    /// Delay before a guardian change becomes confirmable
    pub security_period: u64,
    /// Interval during which a matured guardian change stays confirmable
    pub security_window: u64,
    /// Duration of a lock
    pub lock_period: u64,
    /// Delay before a recovery becomes executable
    pub recovery_period: u64,
    /// Delay applied to shared registry mutations
    pub registry_timelock: u64,
    /// Administrator of the shared registry (zero disables administration)
    pub registry_admin: Address,
    /// Identities allowed to hold filterless registry entries
    pub internal_executors: Vec<Address>,
    /// Uniswap proxy the aggregator delegates `swapOnUniswap*` to (zero if unknown)
    pub aggregator_uniswap_proxy: Address,
    /// Whether recovery finalization clears the guardian set
    pub clear_guardians_on_recovery: bool,
    /// How far ahead of the current block a nonce's block marker may be
    pub nonce_block_bound: u64,
    /// Gas accounting
    pub gas: GasSchedule,
}

impl Default for CustosConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            relayer: Address::ZERO,
            security_period: DAY,
            security_window: 12 * HOUR,
            lock_period: 5 * DAY,
            recovery_period: 2 * DAY,
            registry_timelock: 7 * DAY,
            registry_admin: Address::ZERO,
            internal_executors: Vec::new(),
            aggregator_uniswap_proxy: Address::ZERO,
            clear_guardians_on_recovery: false,
            nonce_block_bound: 10_000,
            gas: GasSchedule::default(),
        }
    }
}

impl CustosConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CustosError::internal(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay `CUSTOS_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Overlay `CUSTOS_*` variables from an explicit iterator.
    ///
    /// Unknown keys are ignored; malformed values are an error.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            self.set_from_string(&name.to_ascii_lowercase(), value.as_ref())?;
        }
        Ok(())
    }

    /// Set a single field by its snake_case name.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "chain_id" => self.chain_id = parse_u64(key, value)?,
            "relayer" => self.relayer = value.parse()?,
            "security_period" => self.security_period = parse_u64(key, value)?,
            "security_window" => self.security_window = parse_u64(key, value)?,
            "lock_period" => self.lock_period = parse_u64(key, value)?,
            "recovery_period" => self.recovery_period = parse_u64(key, value)?,
            "registry_timelock" => self.registry_timelock = parse_u64(key, value)?,
            "registry_admin" => self.registry_admin = value.parse()?,
            "internal_executors" => {
                self.internal_executors = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<Address>)
                    .collect::<Result<Vec<Address>>>()?;
            }
            "aggregator_uniswap_proxy" => self.aggregator_uniswap_proxy = value.parse()?,
            "clear_guardians_on_recovery" => {
                self.clear_guardians_on_recovery = value.parse().map_err(|_| {
                    CustosError::invalid(format!("{key}: expected true/false, got {value}"))
                })?;
            }
            "nonce_block_bound" => self.nonce_block_bound = parse_u64(key, value)?,
            "gas_base" => self.gas.base = parse_u64(key, value)?,
            "gas_per_signature" => self.gas.per_signature = parse_u64(key, value)?,
            "gas_per_call" => self.gas.per_call = parse_u64(key, value)?,
            _ => tracing::debug!(key, "ignoring unknown configuration key"),
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("security_period", self.security_period),
            ("security_window", self.security_window),
            ("lock_period", self.lock_period),
            ("recovery_period", self.recovery_period),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(CustosError::invalid(format!("{name} must be non-zero")));
            }
        }
        if self.nonce_block_bound == 0 {
            return Err(CustosError::invalid("nonce_block_bound must be non-zero"));
        }
        if self.internal_executors.iter().any(Address::is_zero) {
            return Err(CustosError::invalid(
                "internal_executors must not contain the zero address",
            ));
        }
        Ok(())
    }

    /// Whether `address` may hold a filterless registry entry.
    pub fn is_internal_executor(&self, address: &Address) -> bool {
        self.internal_executors.contains(address)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| CustosError::invalid(format!("{key}: expected an unsigned integer, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = CustosConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.security_period, 86_400);
        assert_eq!(config.security_window, 43_200);
        assert_eq!(config.lock_period, 432_000);
        assert_eq!(config.recovery_period, 172_800);
        assert_eq!(config.registry_timelock, 604_800);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CustosConfig::from_toml_str(
            r#"
            security_period = 2
            security_window = 2

            [gas]
            per_call = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.security_period, 2);
        assert_eq!(config.lock_period, CustosConfig::default().lock_period);
        assert_eq!(config.gas.per_call, 7);
        assert_eq!(config.gas.base, GasSchedule::default().base);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "registry_admin = \"0x{}\"\nclear_guardians_on_recovery = true",
            "aa".repeat(20)
        )
        .unwrap();
        let config = CustosConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.registry_admin, Address::repeat_byte(0xaa));
        assert!(config.clear_guardians_on_recovery);
    }

    #[test]
    fn test_env_overlay() {
        let mut config = CustosConfig::default();
        let executor = Address::repeat_byte(0x42);
        config
            .merge_with_vars([
                ("CUSTOS_LOCK_PERIOD", "4".to_string()),
                ("CUSTOS_INTERNAL_EXECUTORS", executor.to_string()),
                ("CUSTOS_AGGREGATOR_UNISWAP_PROXY", executor.to_string()),
                ("PATH", "/usr/bin".to_string()),
                ("CUSTOS_SOMETHING_ELSE", "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.lock_period, 4);
        assert!(config.is_internal_executor(&executor));
        assert_eq!(config.aggregator_uniswap_proxy, executor);
    }

    #[test]
    fn test_env_overlay_rejects_malformed_value() {
        let mut config = CustosConfig::default();
        let err = config
            .merge_with_vars([("CUSTOS_SECURITY_WINDOW", "soon")])
            .unwrap_err();
        assert!(matches!(err, CustosError::Invalid { .. }));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = CustosConfig {
            security_window: 0,
            ..CustosConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gas_schedule() {
        let gas = GasSchedule {
            base: 100,
            per_signature: 10,
            per_call: 1,
        };
        assert_eq!(gas.gas_used(2, 3), 123);
    }
}
