//! Issuance workflow orchestration
//!
//! Drives one issuance run through its explicit state machine:
//!
//! ```text
//! Idle -> Funded -> Initialized -> Minted -> AuthorityRevoked
//!   \________\___________\__________\______> Failed(phase)
//! ```
//!
//! Each transition corresponds to one confirmed ledger effect. A failure in
//! any phase absorbs the run into `Failed`; the orchestrator never retries
//! across phases (transient retries live inside the submission client) and
//! a run can only be started from `Idle`.

use solana_sdk::signature::{Keypair, Signer};
use spl_token_2022::extension::ExtensionType;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FundingConfig;
use crate::sizer::{self, SizerError};
use crate::submitter::{SubmissionClient, SubmissionError};
use crate::tx_builder::{BuildError, InitPlanParams, IssuanceTxBuilder};
use crate::types::{IssuanceReceipt, IssuanceRequest};
use crate::wallet::IssuerWallet;

/// Workflow phases, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Funding,
    Sizing,
    Init,
    Mint,
    Revoke,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Funding => "funding",
            Self::Sizing => "sizing",
            Self::Init => "init",
            Self::Mint => "mint",
            Self::Revoke => "revoke",
        };
        f.write_str(name)
    }
}

/// Observable workflow state. `AuthorityRevoked` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Funded,
    Initialized,
    Minted,
    AuthorityRevoked,
    Failed(Phase),
}

/// Root cause of a failed run.
#[derive(Debug, Error)]
pub enum IssuanceFailure {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sizing(#[from] SizerError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("issuer balance {balance} lamports is below the required {required}")]
    InsufficientBalance { balance: u64, required: u64 },

    #[error("workflow already ran (state: {0:?})")]
    AlreadyRan(WorkflowState),

    #[error("metadata construction failed: {0}")]
    Metadata(String),
}

/// A failed run, attributed to the phase that broke.
#[derive(Debug, Error)]
#[error("issuance failed during {phase}: {source}")]
pub struct IssuanceError {
    pub phase: Phase,
    #[source]
    pub source: IssuanceFailure,
}

/// Drives one issuance run end to end.
#[derive(Debug)]
pub struct IssuanceOrchestrator {
    client: SubmissionClient,
    builder: IssuanceTxBuilder,
    wallet: IssuerWallet,
    funding: FundingConfig,
    state: WorkflowState,
    /// Correlation id tying all log events of one run together.
    run_id: Uuid,
}

impl IssuanceOrchestrator {
    pub fn new(client: SubmissionClient, wallet: IssuerWallet, funding: FundingConfig) -> Self {
        Self {
            client,
            builder: IssuanceTxBuilder::new(),
            wallet,
            funding,
            state: WorkflowState::Idle,
            run_id: Uuid::new_v4(),
        }
    }

    /// Override the transaction builder (test doubles, forks).
    pub fn with_builder(mut self, builder: IssuanceTxBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn advance(&mut self, next: WorkflowState) {
        info!(run_id = %self.run_id, from = ?self.state, to = ?next, "Workflow state transition");
        self.state = next;
    }

    fn fail(&mut self, phase: Phase, source: impl Into<IssuanceFailure>) -> IssuanceError {
        let source = source.into();
        warn!(run_id = %self.run_id, phase = %phase, error = %source, "Workflow failed");
        self.state = WorkflowState::Failed(phase);
        IssuanceError { phase, source }
    }

    /// Run the full workflow: fund, size, init, mint, revoke.
    ///
    /// Consumable exactly once per orchestrator; a second call fails without
    /// touching the ledger.
    pub async fn run(
        &mut self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceReceipt, IssuanceError> {
        if self.state != WorkflowState::Idle {
            let state = self.state;
            return Err(self.fail(Phase::Funding, IssuanceFailure::AlreadyRan(state)));
        }

        let issuer = self.wallet.pubkey();
        info!(
            run_id = %self.run_id,
            issuer = %issuer,
            owner = %request.owner,
            amount = request.amount,
            "Starting issuance"
        );

        self.ensure_funded().await?;
        self.advance(WorkflowState::Funded);

        // The mint keypair exists only for this run; after init its only
        // relevance is the address.
        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();

        let metadata = request
            .metadata
            .to_token_metadata(&mint, &issuer)
            .map_err(|e| self.fail(Phase::Sizing, IssuanceFailure::Metadata(e.to_string())))?;

        let requirements = match sizer::compute_requirements(
            self.client.ledger().as_ref(),
            &[ExtensionType::MetadataPointer],
            &metadata,
        )
        .await
        {
            Ok(requirements) => requirements,
            Err(err) => return Err(self.fail(Phase::Sizing, err)),
        };

        let update_authority = request.metadata.final_update_authority(&issuer);
        let init_plan = self
            .builder
            .build_init_plan(&InitPlanParams {
                payer: &issuer,
                mint: &mint,
                mint_authority: &issuer,
                update_authority: &update_authority,
                decimals: request.decimals,
                requirements,
                metadata: &metadata,
            })
            .map_err(|e| self.fail(Phase::Init, e))?;

        let init_signature = match self
            .client
            .submit_and_confirm(
                init_plan.label,
                &init_plan.instructions,
                &issuer,
                &[self.wallet.keypair(), &mint_keypair],
            )
            .await
        {
            Ok(signature) => signature,
            Err(err) => return Err(self.fail(Phase::Init, err)),
        };
        self.advance(WorkflowState::Initialized);

        let (token_account, mint_plan) = self
            .builder
            .build_mint_plan(&issuer, &mint, &request.owner, &issuer, request.amount)
            .map_err(|e| self.fail(Phase::Mint, e))?;

        let mint_signature = match self
            .client
            .submit_and_confirm(
                mint_plan.label,
                &mint_plan.instructions,
                &issuer,
                &[self.wallet.keypair()],
            )
            .await
        {
            Ok(signature) => signature,
            Err(err) => return Err(self.fail(Phase::Mint, err)),
        };
        self.advance(WorkflowState::Minted);

        let revoke_plan = self
            .builder
            .build_revoke_plan(&mint, &issuer, &request.disposition)
            .map_err(|e| self.fail(Phase::Revoke, e))?;

        let revoke_signature = match self
            .client
            .submit_and_confirm(
                revoke_plan.label,
                &revoke_plan.instructions,
                &issuer,
                &[self.wallet.keypair()],
            )
            .await
        {
            Ok(signature) => signature,
            Err(err) => return Err(self.fail(Phase::Revoke, err)),
        };
        self.advance(WorkflowState::AuthorityRevoked);

        info!(
            run_id = %self.run_id,
            mint = %mint,
            token_account = %token_account,
            "Issuance complete"
        );

        Ok(IssuanceReceipt {
            mint,
            token_account,
            init_signature,
            mint_signature,
            revoke_signature,
        })
    }

    /// Check the issuer balance and airdrop when below the configured
    /// minimum. Airdrops only exist on test clusters; on others the RPC
    /// rejects the request and the run fails here, before any state change.
    async fn ensure_funded(&mut self) -> Result<(), IssuanceError> {
        let issuer = self.wallet.pubkey();
        let ledger = self.client.ledger();

        let balance = ledger
            .balance(&issuer)
            .await
            .map_err(|e| self.fail(Phase::Funding, e))?;
        if balance >= self.funding.min_balance_lamports {
            return Ok(());
        }

        if self.funding.airdrop_lamports == 0 {
            let required = self.funding.min_balance_lamports;
            return Err(self.fail(
                Phase::Funding,
                IssuanceFailure::InsufficientBalance { balance, required },
            ));
        }

        info!(
            balance,
            airdrop = self.funding.airdrop_lamports,
            "Issuer below minimum balance, requesting airdrop"
        );
        let signature = ledger
            .request_airdrop(&issuer, self.funding.airdrop_lamports)
            .await
            .map_err(|e| self.fail(Phase::Funding, e))?;
        self.client
            .confirm(&signature)
            .await
            .map_err(|e| self.fail(Phase::Funding, e))?;

        let balance = ledger
            .balance(&issuer)
            .await
            .map_err(|e| self.fail(Phase::Funding, e))?;
        if balance < self.funding.min_balance_lamports {
            let required = self.funding.min_balance_lamports;
            return Err(self.fail(
                Phase::Funding,
                IssuanceFailure::InsufficientBalance { balance, required },
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display_names() {
        assert_eq!(Phase::Funding.to_string(), "funding");
        assert_eq!(Phase::Revoke.to_string(), "revoke");
    }

    #[test]
    fn failed_state_carries_the_phase() {
        assert_ne!(
            WorkflowState::Failed(Phase::Init),
            WorkflowState::Failed(Phase::Mint)
        );
    }
}
