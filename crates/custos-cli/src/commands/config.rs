//! `custos config`

use anyhow::{Context, Result};
use custos_core::CustosConfig;

pub fn show(config: &CustosConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    print!("{rendered}");
    Ok(())
}
