//! Issuer wallet management

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use zeroize::Zeroize;

/// Holds the issuer keypair for the lifetime of a run.
///
/// Ephemeral wallets exist only in memory; nothing here writes key material
/// to disk or includes it in logs.
pub struct IssuerWallet {
    keypair: Arc<Keypair>,
}

impl IssuerWallet {
    /// Load the issuer keypair from a file (raw 64 bytes or a JSON byte
    /// array, the two formats the standard tooling writes).
    pub fn from_file(path: &str) -> Result<Self> {
        let mut keypair_bytes =
            std::fs::read(path).with_context(|| format!("Failed to read keypair file: {path}"))?;

        let keypair = if keypair_bytes.len() == 64 {
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            let mut json: Vec<u8> =
                serde_json::from_slice(&keypair_bytes).context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!(
                    "Invalid keypair length: expected 64 bytes, got {}",
                    json.len()
                );
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            let keypair = Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?;
            json.zeroize();
            keypair
        };
        keypair_bytes.zeroize();

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Load the issuer keypair from a base58-encoded secret, as passed via
    /// an environment variable. The decoded buffer is wiped after parsing.
    pub fn from_base58_secret(secret: &str) -> Result<Self> {
        let mut bytes = bs58::decode(secret.trim())
            .into_vec()
            .context("Failed to decode base58 secret")?;
        if bytes.len() != 64 {
            anyhow::bail!("Invalid secret length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")?;
        bytes.zeroize();

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Generate a fresh in-memory keypair for this run.
    pub fn ephemeral() -> Self {
        Self {
            keypair: Arc::new(Keypair::new()),
        }
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn keypair_arc(&self) -> Arc<Keypair> {
        Arc::clone(&self.keypair)
    }
}

impl Clone for IssuerWallet {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}

impl std::fmt::Debug for IssuerWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the secret half.
        f.debug_struct("IssuerWallet")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}
