//! Mintforge - Token-2022 NFT issuance CLI
//!
//! Runs one issuance workflow end to end against the configured cluster:
//! fund the issuer, create and initialize the metadata-carrying mint,
//! mint the supply to the owner's associated token account, and revoke
//! (or hand over) the mint authority.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintforge::config::Config;
use mintforge::explorer::{self, Cluster};
use mintforge::orchestrator::IssuanceOrchestrator;
use mintforge::submitter::{SolanaLedger, SubmissionClient};
use mintforge::wallet::IssuerWallet;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Issuer keypair file, overriding the configured path
    #[arg(short, long)]
    keypair: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("🚀 Starting Mintforge issuance");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let mut config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(path) = args.keypair {
        config.wallet.keypair_path = Some(path);
    }
    let request = config.issuance_request()?;
    let commitment = config.commitment()?;

    let wallet = if let Ok(secret) = std::env::var("MINTFORGE_ISSUER_SECRET") {
        info!("🔑 Loading issuer wallet from MINTFORGE_ISSUER_SECRET");
        IssuerWallet::from_base58_secret(&secret).context("Failed to load wallet from env")?
    } else if let Some(path) = &config.wallet.keypair_path {
        info!("🔑 Loading issuer wallet from: {path}");
        IssuerWallet::from_file(path).context("Failed to load wallet")?
    } else {
        warn!("No keypair configured, generating an ephemeral issuer wallet");
        IssuerWallet::ephemeral()
    };
    info!("💼 Issuer address: {}", wallet.pubkey());

    info!("🌐 Connecting to RPC endpoint: {}", config.rpc.endpoint);
    let cluster = Cluster::from_endpoint(&config.rpc.endpoint);
    let ledger = SolanaLedger::new(
        config.rpc.endpoint.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
        commitment,
    );
    let client = SubmissionClient::new(Arc::new(ledger), commitment, config.retry_policy())
        .with_confirm_timeout(Duration::from_secs(config.rpc.confirm_timeout_secs))
        .with_poll_interval(Duration::from_millis(config.rpc.poll_interval_ms));

    let mut orchestrator = IssuanceOrchestrator::new(client, wallet, config.funding.clone());
    let receipt = orchestrator.run(&request).await?;

    info!("✅ Issuance complete");
    info!("   Mint:          {}", explorer::account_url(&receipt.mint, &cluster));
    info!(
        "   Token account: {}",
        explorer::account_url(&receipt.token_account, &cluster)
    );
    info!(
        "   Init tx:       {}",
        explorer::transaction_url(&receipt.init_signature, &cluster)
    );
    info!(
        "   Mint tx:       {}",
        explorer::transaction_url(&receipt.mint_signature, &cluster)
    );
    info!(
        "   Revoke tx:     {}",
        explorer::transaction_url(&receipt.revoke_signature, &cluster)
    );

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "mintforge=debug,info"
    } else {
        "mintforge=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}
