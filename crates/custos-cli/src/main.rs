//! Operator CLI for Custos
//!
//! Offline tooling around the wallet authorization core: inspect the signer
//! policy, check whether a call would pass the registry filters, hash relay
//! requests for signing, and show the effective configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod effects;

use commands::{check_call, common, config, policy, request};

#[derive(Parser)]
#[command(name = "custos")]
#[command(about = "Custos - guardian-protected wallet authorization tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration as TOML
    Config,

    /// Show which signers an operation class requires
    Policy {
        /// Operation class (e.g. `ordinary`, `recovery-start`); all classes when omitted
        #[arg(long)]
        class: Option<String>,

        /// Number of guardians on the wallet
        #[arg(short, long, default_value = "0")]
        guardians: usize,

        /// Evaluate as if the wallet were locked
        #[arg(long)]
        locked: bool,

        /// Evaluate as if the pending recovery were abandoned
        #[arg(long)]
        abandoned: bool,
    },

    /// Check a call against a registry scenario
    CheckCall {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Print the signing digest of a relay request
    HashRequest {
        /// Request file (JSON)
        #[arg(short, long)]
        request: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => config::show(&config)?,
        Commands::Policy {
            class,
            guardians,
            locked,
            abandoned,
        } => policy::show(class.as_deref(), guardians, locked, abandoned)?,
        Commands::CheckCall { scenario } => check_call::run(&config, &scenario).await?,
        Commands::HashRequest { request } => request::hash(&config, &request)?,
    }

    Ok(())
}
