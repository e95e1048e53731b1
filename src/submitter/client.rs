//! Submission client and the production RPC-backed ledger

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use solana_transaction_status::TransactionStatus;
use tracing::{debug, info, warn};

use super::errors::{RetryPolicy, SubmissionError};
use super::LedgerRpc;

/// Production [`LedgerRpc`] backed by the nonblocking Solana RPC client.
pub struct SolanaLedger {
    endpoint: String,
    client: RpcClient,
}

impl fmt::Debug for SolanaLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaLedger")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl SolanaLedger {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        commitment: CommitmentConfig,
    ) -> Self {
        let endpoint = endpoint.into();
        let client =
            RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: solana_client::client_error::ClientError) -> SubmissionError {
        SubmissionError::from_client_error(&err, &self.endpoint)
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn minimum_balance_for_rent_exemption(
        &self,
        space: usize,
    ) -> Result<u64, SubmissionError> {
        self.client
            .get_minimum_balance_for_rent_exemption(space)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn latest_blockhash(&self) -> Result<Hash, SubmissionError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| self.classify(e))
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64, SubmissionError> {
        self.client
            .get_balance(account)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn request_airdrop(
        &self,
        account: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, SubmissionError> {
        self.client
            .request_airdrop(account, lamports)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, SubmissionError> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SubmissionError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.classify(e))?;
        Ok(response.value.into_iter().next().flatten())
    }
}

/// Signs, broadcasts, and confirms transactions against a [`LedgerRpc`].
///
/// Each successful call irreversibly mutates ledger state; a failed call
/// leaves it untouched (the ledger applies transactions atomically).
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    ledger: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
    retry: RetryPolicy,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl SubmissionClient {
    pub fn new(ledger: Arc<dyn LedgerRpc>, commitment: CommitmentConfig, retry: RetryPolicy) -> Self {
        Self {
            ledger,
            commitment,
            retry,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(400),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn ledger(&self) -> Arc<dyn LedgerRpc> {
        Arc::clone(&self.ledger)
    }

    /// Sign `instructions` with `signers`, broadcast, and wait for the
    /// configured commitment.
    ///
    /// Transient transport failures are retried per the retry policy by
    /// resubmitting the *same* signed transaction: an errored broadcast may
    /// still have reached the ledger, and a differently-signed resubmission
    /// could then execute twice. Before every retry the original signature
    /// is polled first, and a landed broadcast is confirmed instead of
    /// resent; only a stale blockhash forces a re-sign. Ledger rejections
    /// and confirmation-deadline exhaustion are returned immediately.
    pub async fn submit_and_confirm(
        &self,
        label: &str,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Signature, SubmissionError> {
        if instructions.is_empty() {
            return Err(SubmissionError::Internal(format!(
                "transaction '{label}' has no instructions"
            )));
        }

        // The payer, mint keypair, and authority may coincide; the message
        // wants each signature exactly once.
        let mut seen: Vec<Pubkey> = Vec::with_capacity(signers.len());
        let mut unique: Vec<&Keypair> = Vec::with_capacity(signers.len());
        for signer in signers {
            if !seen.contains(&signer.pubkey()) {
                seen.push(signer.pubkey());
                unique.push(signer);
            }
        }

        let mut attempt: u32 = 0;
        let mut transaction = self.sign(label, instructions, payer, &unique).await?;
        loop {
            let signature = transaction.signatures[0];
            match self.send_and_confirm(label, &transaction).await {
                Ok(()) => {
                    info!(
                        label = %label,
                        signature = %signature,
                        attempt = attempt,
                        "Transaction confirmed"
                    );
                    return Ok(signature);
                }
                Err(err) if err.is_retryable() => {
                    // The send error is ambiguous: the broadcast may have
                    // landed. Resolve against the ledger before retrying.
                    if let Ok(Some(_)) = self.ledger.signature_status(&signature).await {
                        debug!(
                            label = %label,
                            signature = %signature,
                            "Broadcast landed despite the send error"
                        );
                        self.confirm(&signature).await?;
                        info!(
                            label = %label,
                            signature = %signature,
                            attempt = attempt,
                            "Transaction confirmed"
                        );
                        return Ok(signature);
                    }

                    match self.retry.calculate_delay(attempt) {
                        Some(delay) => {
                            warn!(
                                label = %label,
                                attempt = attempt,
                                category = err.category(),
                                error = %err,
                                "Transient submission failure, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            // Only a stale blockhash invalidates the signed
                            // transaction; anything else resubmits it
                            // verbatim so the ledger can deduplicate.
                            if matches!(err, SubmissionError::BlockhashNotFound { .. }) {
                                transaction =
                                    self.sign(label, instructions, payer, &unique).await?;
                            }
                        }
                        None => {
                            warn!(
                                label = %label,
                                attempts = attempt + 1,
                                error = %err,
                                "Retry budget exhausted"
                            );
                            return Err(err);
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        label = %label,
                        category = err.category(),
                        error = %err,
                        "Fatal submission failure"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn sign(
        &self,
        label: &str,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Transaction, SubmissionError> {
        let blockhash = self.ledger.latest_blockhash().await?;
        let message = Message::new(instructions, Some(payer));
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(&signers.to_vec(), blockhash)
            .map_err(|e| SubmissionError::Internal(format!("signing '{label}' failed: {e}")))?;
        Ok(transaction)
    }

    async fn send_and_confirm(
        &self,
        label: &str,
        transaction: &Transaction,
    ) -> Result<(), SubmissionError> {
        let signature = self.ledger.send_transaction(transaction).await?;
        debug!(label = %label, signature = %signature, "Transaction broadcast");
        self.confirm(&signature).await?;
        Ok(())
    }

    /// Poll until `signature` reaches the configured commitment level.
    pub async fn confirm(&self, signature: &Signature) -> Result<(), SubmissionError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.ledger.signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        return Err(SubmissionError::Rejected {
                            reason: format!("{err} ({signature})"),
                        });
                    }
                    if status.satisfies_commitment(self.commitment) {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                // Tolerate transient polling errors until the deadline.
                Err(err) if err.is_retryable() => {
                    debug!(signature = %signature, error = %err, "Status poll failed");
                }
                Err(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                return Err(SubmissionError::ConfirmationTimeout {
                    signature: signature.to_string(),
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
