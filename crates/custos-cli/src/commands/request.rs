//! `custos hash-request`

use anyhow::{Context, Result};
use custos_core::CustosConfig;
use custos_relay::RelayRequest;
use std::path::Path;

use super::common::read_file;

pub fn hash(config: &CustosConfig, path: &Path) -> Result<()> {
    let request: RelayRequest = serde_json::from_str(&read_file(path)?)
        .with_context(|| format!("parsing request {}", path.display()))?;
    if request.chain_id != config.chain_id {
        tracing::warn!(
            request = request.chain_id,
            configured = config.chain_id,
            "request targets a different chain"
        );
    }
    println!("operation  {}", request.operation.name());
    println!("class      {}", request.operation.class());
    println!("nonce      {}", request.nonce);
    println!("digest     {}", digest_hex(config, &request)?);
    Ok(())
}

fn digest_hex(config: &CustosConfig, request: &RelayRequest) -> Result<String> {
    let digest = request.hash(config.relayer)?;
    Ok(format!("0x{}", hex::encode(digest)))
}
