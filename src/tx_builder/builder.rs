//! Transaction plan assembly

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::errors::BuildError;
use super::instructions::{
    plan_init_instructions, plan_mint_instructions, plan_revoke_instructions,
    sanity_check_init_order, InitPlanParams,
};
use crate::types::AuthorityDisposition;

/// A labeled, ordered instruction list ready for signing.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub label: &'static str,
    pub instructions: Vec<Instruction>,
}

impl TransactionPlan {
    fn checked(label: &'static str, instructions: Vec<Instruction>) -> Result<Self, BuildError> {
        if instructions.is_empty() {
            return Err(BuildError::EmptyPlan { label });
        }
        Ok(Self {
            label,
            instructions,
        })
    }
}

/// Assembles the three issuance transactions against one token program.
#[derive(Debug, Clone)]
pub struct IssuanceTxBuilder {
    token_program: Pubkey,
}

impl Default for IssuanceTxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IssuanceTxBuilder {
    pub fn new() -> Self {
        Self {
            token_program: spl_token_2022::id(),
        }
    }

    /// Override the token program id (test doubles, forks).
    pub fn with_token_program(mut self, token_program: Pubkey) -> Self {
        self.token_program = token_program;
        self
    }

    pub fn token_program(&self) -> &Pubkey {
        &self.token_program
    }

    /// Build the init plan: account creation, pointer, mint, and metadata
    /// initialization plus field updates, in the protocol-mandated order.
    pub fn build_init_plan(
        &self,
        params: &InitPlanParams<'_>,
    ) -> Result<TransactionPlan, BuildError> {
        let instructions = plan_init_instructions(&self.token_program, params)?;
        sanity_check_init_order(&instructions, &self.token_program)?;
        debug!(
            mint = %params.mint,
            instructions = instructions.len(),
            space = params.requirements.space,
            "Built init plan"
        );
        TransactionPlan::checked("init", instructions)
    }

    /// Build the mint plan and return the derived token account it funds.
    pub fn build_mint_plan(
        &self,
        payer: &Pubkey,
        mint: &Pubkey,
        owner: &Pubkey,
        mint_authority: &Pubkey,
        amount: u64,
    ) -> Result<(Pubkey, TransactionPlan), BuildError> {
        let (token_account, instructions) = plan_mint_instructions(
            &self.token_program,
            payer,
            mint,
            owner,
            mint_authority,
            amount,
        )?;
        debug!(mint = %mint, token_account = %token_account, amount, "Built mint plan");
        Ok((token_account, TransactionPlan::checked("mint", instructions)?))
    }

    /// Build the revoke plan reassigning or discarding the mint authority.
    pub fn build_revoke_plan(
        &self,
        mint: &Pubkey,
        current_authority: &Pubkey,
        disposition: &AuthorityDisposition,
    ) -> Result<TransactionPlan, BuildError> {
        let instructions = plan_revoke_instructions(
            &self.token_program,
            mint,
            current_authority,
            disposition,
        )?;
        debug!(mint = %mint, disposition = ?disposition, "Built revoke plan");
        TransactionPlan::checked("revoke", instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizer::AccountRequirements;
    use spl_token_metadata_interface::state::TokenMetadata;

    fn metadata(mint: &Pubkey, authority: &Pubkey) -> TokenMetadata {
        TokenMetadata {
            update_authority: Some(*authority).try_into().unwrap(),
            mint: *mint,
            name: "Mark 1".to_string(),
            symbol: "MARK1".to_string(),
            uri: "https://example.com/mark1.json".to_string(),
            additional_metadata: vec![("Background".to_string(), "Blue".to_string())],
        }
    }

    #[test]
    fn init_plan_passes_its_own_ordering_check() {
        let builder = IssuanceTxBuilder::new();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let md = metadata(&mint, &authority);

        let plan = builder
            .build_init_plan(&InitPlanParams {
                payer: &authority,
                mint: &mint,
                mint_authority: &authority,
                update_authority: &authority,
                decimals: 0,
                requirements: AccountRequirements {
                    space: 400,
                    rent_lamports: 3_000_000,
                },
                metadata: &md,
            })
            .unwrap();

        assert_eq!(plan.label, "init");
        assert_eq!(plan.instructions.len(), 5);
    }

    #[test]
    fn mint_plan_reports_the_token_account() {
        let builder = IssuanceTxBuilder::new();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let (token_account, plan) = builder
            .build_mint_plan(&Pubkey::new_unique(), &mint, &owner, &Pubkey::new_unique(), 500)
            .unwrap();

        assert_ne!(token_account, Pubkey::default());
        assert_eq!(plan.label, "mint");
        assert_eq!(plan.instructions.len(), 2);
    }

    #[test]
    fn revoke_plan_is_single_instruction() {
        let builder = IssuanceTxBuilder::new();
        let plan = builder
            .build_revoke_plan(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &AuthorityDisposition::Revoke,
            )
            .unwrap();
        assert_eq!(plan.label, "revoke");
        assert_eq!(plan.instructions.len(), 1);
    }
}
