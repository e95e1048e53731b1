//! Transaction submission and confirmation
//!
//! Signs assembled instruction lists, broadcasts them to the ledger RPC
//! endpoint, and polls until the requested commitment level is reached.
//! Transient transport failures are retried within an explicit
//! [`RetryPolicy`]; explicit ledger rejections are surfaced immediately
//! with the original diagnostic. The RPC transport sits behind the
//! [`LedgerRpc`] seam so the workflow can run against an in-memory ledger
//! double in tests.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::TransactionStatus;

pub mod client;
pub mod errors;

pub use client::{SolanaLedger, SubmissionClient};
pub use errors::{RetryPolicy, SubmissionError};

/// Minimal ledger RPC surface consumed by the issuance workflow.
///
/// Production wraps the nonblocking Solana RPC client; tests substitute an
/// in-memory double enforcing Token-2022 semantics.
#[async_trait]
pub trait LedgerRpc: Send + Sync + std::fmt::Debug {
    /// Minimum balance making an account of `space` bytes rent-exempt.
    async fn minimum_balance_for_rent_exemption(
        &self,
        space: usize,
    ) -> Result<u64, SubmissionError>;

    /// A recent blockhash to sign against.
    async fn latest_blockhash(&self) -> Result<Hash, SubmissionError>;

    /// Lamport balance of an account.
    async fn balance(&self, account: &Pubkey) -> Result<u64, SubmissionError>;

    /// Request an airdrop to `account`. Only available on test clusters.
    async fn request_airdrop(
        &self,
        account: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, SubmissionError>;

    /// Broadcast a signed transaction, returning its signature.
    async fn send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, SubmissionError>;

    /// Current confirmation status of a signature, if the ledger has seen it.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SubmissionError>;
}
