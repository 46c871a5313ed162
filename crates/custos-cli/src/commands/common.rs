//! Shared helpers

use anyhow::{Context, Result};
use custos_core::CustosConfig;
use std::path::Path;

/// Load configuration from `path` (or defaults), overlay `CUSTOS_*`
/// environment variables and validate.
pub fn load_config(path: Option<&Path>) -> Result<CustosConfig> {
    let mut config = match path {
        Some(path) => CustosConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CustosConfig::default(),
    };
    config.merge_with_env().context("applying CUSTOS_* overrides")?;
    config.validate().context("invalid configuration")?;
    tracing::debug!(chain_id = config.chain_id, relayer = %config.relayer, "configuration loaded");
    Ok(config)
}

/// Read a whole file with the path in the error.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
