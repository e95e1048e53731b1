//! Configuration for the issuance workflow
//!
//! Loaded from a TOML file with environment overrides for the pieces that
//! vary per deployment (endpoint, keypair path). Addresses are written as
//! base58 strings in the file and parsed at load time so a typo fails the
//! run before any lamport is spent.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;

use crate::submitter::RetryPolicy;
use crate::types::{AuthorityDisposition, IssuanceRequest, MetadataSpec};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Issuer funding configuration
    #[serde(default)]
    pub funding: FundingConfig,

    /// Token parameters
    pub token: TokenConfig,

    /// Embedded metadata record
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Commitment level for confirmations: processed, confirmed, finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Max submission attempts per transaction
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry backoff in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Confirmation polling deadline in seconds
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Confirmation polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to the issuer keypair file. When unset, an ephemeral keypair
    /// is generated for the run and never written to disk.
    #[serde(default)]
    pub keypair_path: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { keypair_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Airdrop size in lamports when the issuer balance is below the
    /// minimum. Only honored on test clusters.
    #[serde(default = "default_airdrop_lamports")]
    pub airdrop_lamports: u64,

    /// Minimum issuer balance required before issuance starts.
    #[serde(default = "default_min_balance")]
    pub min_balance_lamports: u64,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            airdrop_lamports: default_airdrop_lamports(),
            min_balance_lamports: default_min_balance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Mint decimals; 0 for whole-unit collectibles
    #[serde(default)]
    pub decimals: u8,

    /// Supply to mint, in base units
    pub amount: u64,

    /// Token owner receiving the minted supply (base58)
    pub owner: String,

    /// Mint-authority disposition after minting: omit to revoke, set to a
    /// base58 address to transfer custody instead
    #[serde(default)]
    pub authority_custodian: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub name: String,
    pub symbol: String,
    pub uri: String,

    /// Metadata update authority after init (base58); defaults to the issuer
    #[serde(default)]
    pub update_authority: Option<String>,

    /// Additional key/value pairs, applied in file order
    #[serde(default)]
    pub additional: Vec<MetadataPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataPair {
    pub key: String,
    pub value: String,
}

// Default value functions
fn default_endpoint() -> String {
    "http://127.0.0.1:8899".to_string()
}
fn default_rpc_timeout() -> u64 {
    30
}
fn default_commitment() -> String {
    "confirmed".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_confirm_timeout() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    400
}
fn default_airdrop_lamports() -> u64 {
    2 * LAMPORTS_PER_SOL
}
fn default_min_balance() -> u64 {
    LAMPORTS_PER_SOL / 10
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides applied
    /// (`MINTFORGE_RPC_ENDPOINT`, `MINTFORGE_KEYPAIR_PATH`).
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        if let Ok(endpoint) = std::env::var("MINTFORGE_RPC_ENDPOINT") {
            config.rpc.endpoint = endpoint;
        }
        if let Ok(path) = std::env::var("MINTFORGE_KEYPAIR_PATH") {
            config.wallet.keypair_path = Some(path);
        }
        Ok(config)
    }

    /// Reject configurations that would fail mid-workflow.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.amount == 0 {
            anyhow::bail!("token.amount must be non-zero");
        }
        if self.metadata.name.is_empty() || self.metadata.symbol.is_empty() {
            anyhow::bail!("metadata.name and metadata.symbol must be non-empty");
        }
        parse_pubkey("token.owner", &self.token.owner)?;
        if let Some(custodian) = &self.token.authority_custodian {
            parse_pubkey("token.authority_custodian", custodian)?;
        }
        if let Some(authority) = &self.metadata.update_authority {
            parse_pubkey("metadata.update_authority", authority)?;
        }
        self.commitment()?;
        Ok(())
    }

    pub fn commitment(&self) -> anyhow::Result<CommitmentConfig> {
        match self.rpc.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => anyhow::bail!("unknown commitment level: {other}"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.rpc.max_attempts,
            base_delay_ms: self.rpc.base_delay_ms,
            ..RetryPolicy::default()
        }
    }

    /// Materialize the issuance request this configuration describes.
    pub fn issuance_request(&self) -> anyhow::Result<IssuanceRequest> {
        let owner = parse_pubkey("token.owner", &self.token.owner)?;
        let disposition = match &self.token.authority_custodian {
            Some(custodian) => {
                AuthorityDisposition::Custodian(parse_pubkey("token.authority_custodian", custodian)?)
            }
            None => AuthorityDisposition::Revoke,
        };
        let update_authority = self
            .metadata
            .update_authority
            .as_deref()
            .map(|s| parse_pubkey("metadata.update_authority", s))
            .transpose()?;

        Ok(IssuanceRequest {
            decimals: self.token.decimals,
            amount: self.token.amount,
            owner,
            metadata: MetadataSpec {
                name: self.metadata.name.clone(),
                symbol: self.metadata.symbol.clone(),
                uri: self.metadata.uri.clone(),
                update_authority,
                additional: self
                    .metadata
                    .additional
                    .iter()
                    .map(|p| (p.key.clone(), p.value.clone()))
                    .collect(),
            },
            disposition,
        })
    }
}

fn parse_pubkey(field: &str, value: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(value).map_err(|e| anyhow::anyhow!("invalid {field} address '{value}': {e}"))
}
