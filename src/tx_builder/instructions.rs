//! Instruction planning and ordering validation
//!
//! The init transaction's instruction order is a protocol requirement, not
//! a stylistic one:
//!
//! 1. create the mint account at its final size and funding
//! 2. initialize the metadata-pointer extension (must precede mint init)
//! 3. initialize the mint itself
//! 4. initialize the embedded metadata record (requires an initialized mint)
//! 5. one update-field instruction per additional pair, in list order
//!
//! Reordering any of these is rejected by the token program. The sanity
//! check mirrors the ledger's view at discriminant level and is compiled
//! only in debug/test builds.

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token_2022::extension::metadata_pointer;
use spl_token_2022::instruction::{self as token_instruction, AuthorityType};
use spl_token_metadata_interface::instruction as metadata_instruction;
use spl_token_metadata_interface::state::{Field, TokenMetadata};

use crate::sizer::AccountRequirements;
use crate::tx_builder::errors::BuildError;
use crate::types::AuthorityDisposition;

/// Inputs for the init transaction plan.
#[derive(Debug)]
pub struct InitPlanParams<'a> {
    pub payer: &'a Pubkey,
    pub mint: &'a Pubkey,
    /// Mint authority during issuance; also holds the metadata update
    /// authority until the final transfer below.
    pub mint_authority: &'a Pubkey,
    /// Metadata update authority after initialization. When it differs
    /// from `mint_authority`, a transfer instruction is appended.
    pub update_authority: &'a Pubkey,
    pub decimals: u8,
    pub requirements: AccountRequirements,
    pub metadata: &'a TokenMetadata,
}

/// Plan the init transaction in the protocol-mandated order.
pub fn plan_init_instructions(
    token_program: &Pubkey,
    params: &InitPlanParams<'_>,
) -> Result<Vec<Instruction>, BuildError> {
    if *params.mint == Pubkey::default() {
        return Err(BuildError::UninitializedMint);
    }

    let metadata = params.metadata;
    let mut instructions = Vec::with_capacity(5 + metadata.additional_metadata.len());

    instructions.push(system_instruction::create_account(
        params.payer,
        params.mint,
        params.requirements.rent_lamports,
        params.requirements.space as u64,
        token_program,
    ));

    // Pointer targets the mint itself: metadata lives inside the account.
    instructions.push(
        metadata_pointer::instruction::initialize(
            token_program,
            params.mint,
            Some(*params.mint_authority),
            Some(*params.mint),
        )
        .map_err(|e| BuildError::instruction_failed("metadata-pointer", e.to_string()))?,
    );

    // No freeze authority: the token is never freezable.
    instructions.push(
        token_instruction::initialize_mint2(
            token_program,
            params.mint,
            params.mint_authority,
            None,
            params.decimals,
        )
        .map_err(|e| BuildError::instruction_failed("spl-token-2022", e.to_string()))?,
    );

    // The issuer holds the update authority during initialization so the
    // additional-field updates below can be signed in the same transaction.
    instructions.push(metadata_instruction::initialize(
        token_program,
        params.mint,
        params.mint_authority,
        params.mint,
        params.mint_authority,
        metadata.name.clone(),
        metadata.symbol.clone(),
        metadata.uri.clone(),
    ));

    for (key, value) in &metadata.additional_metadata {
        instructions.push(metadata_instruction::update_field(
            token_program,
            params.mint,
            params.mint_authority,
            Field::Key(key.clone()),
            value.clone(),
        ));
    }

    if params.update_authority != params.mint_authority {
        let new_authority = Some(*params.update_authority)
            .try_into()
            .map_err(|_| BuildError::Configuration("invalid update authority".to_string()))?;
        instructions.push(metadata_instruction::update_authority(
            token_program,
            params.mint,
            params.mint_authority,
            new_authority,
        ));
    }

    Ok(instructions)
}

/// Plan the mint transaction: idempotent associated-account creation
/// followed by a mint-to for the exact unit amount.
///
/// Returns the derived associated token account address along with the
/// instructions.
pub fn plan_mint_instructions(
    token_program: &Pubkey,
    payer: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    mint_authority: &Pubkey,
    amount: u64,
) -> Result<(Pubkey, Vec<Instruction>), BuildError> {
    if *mint == Pubkey::default() {
        return Err(BuildError::UninitializedMint);
    }
    if amount == 0 {
        return Err(BuildError::Configuration(
            "mint amount must be non-zero".to_string(),
        ));
    }

    let token_account = get_associated_token_address_with_program_id(owner, mint, token_program);
    let instructions = vec![
        create_associated_token_account_idempotent(payer, owner, mint, token_program),
        token_instruction::mint_to(
            token_program,
            mint,
            &token_account,
            mint_authority,
            &[],
            amount,
        )
        .map_err(|e| BuildError::instruction_failed("spl-token-2022", e.to_string()))?,
    ];

    Ok((token_account, instructions))
}

/// Plan the revoke transaction: a single mint-authority reassignment.
pub fn plan_revoke_instructions(
    token_program: &Pubkey,
    mint: &Pubkey,
    current_authority: &Pubkey,
    disposition: &AuthorityDisposition,
) -> Result<Vec<Instruction>, BuildError> {
    if *mint == Pubkey::default() {
        return Err(BuildError::UninitializedMint);
    }

    let instruction = token_instruction::set_authority(
        token_program,
        mint,
        disposition.new_authority(),
        AuthorityType::MintTokens,
        current_authority,
        &[],
    )
    .map_err(|e| BuildError::instruction_failed("spl-token-2022", e.to_string()))?;

    Ok(vec![instruction])
}

// Token-2022 instruction tags checked by the order validation below.
const TAG_METADATA_POINTER_EXTENSION: u8 = 39;
const TAG_METADATA_POINTER_INITIALIZE: u8 = 0;
const TAG_INITIALIZE_MINT2: u8 = 20;

/// Validate init-plan ordering at discriminant level (debug/test only).
///
/// Mirrors the ledger's rejection rules: the account must exist before the
/// pointer is initialized, the pointer before the mint, and the mint before
/// the metadata record.
#[cfg(debug_assertions)]
pub fn sanity_check_init_order(
    instructions: &[Instruction],
    token_program: &Pubkey,
) -> Result<(), BuildError> {
    use solana_sdk::system_program;
    use spl_discriminator::SplDiscriminate;
    use spl_token_metadata_interface::instruction::{Initialize, UpdateAuthority, UpdateField};

    if instructions.len() < 4 {
        return Err(BuildError::invalid_order(format!(
            "init plan needs at least 4 instructions, got {}",
            instructions.len()
        )));
    }

    let create = &instructions[0];
    if create.program_id != system_program::id()
        || create.data.len() < 4
        || create.data[0..4] != [0, 0, 0, 0]
    {
        return Err(BuildError::invalid_order(
            "instruction 0 must be system create_account".to_string(),
        ));
    }

    let pointer = &instructions[1];
    if pointer.program_id != *token_program
        || pointer.data.len() < 2
        || pointer.data[0] != TAG_METADATA_POINTER_EXTENSION
        || pointer.data[1] != TAG_METADATA_POINTER_INITIALIZE
    {
        return Err(BuildError::invalid_order(
            "instruction 1 must initialize the metadata pointer".to_string(),
        ));
    }

    let mint_init = &instructions[2];
    if mint_init.program_id != *token_program
        || mint_init.data.first() != Some(&TAG_INITIALIZE_MINT2)
    {
        return Err(BuildError::invalid_order(
            "instruction 2 must initialize the mint".to_string(),
        ));
    }

    let metadata_init = &instructions[3];
    if metadata_init.program_id != *token_program
        || !metadata_init
            .data
            .starts_with(Initialize::SPL_DISCRIMINATOR_SLICE)
    {
        return Err(BuildError::invalid_order(
            "instruction 3 must initialize the metadata record".to_string(),
        ));
    }

    for (idx, ix) in instructions.iter().enumerate().skip(4) {
        let is_update = ix.data.starts_with(UpdateField::SPL_DISCRIMINATOR_SLICE)
            || ix.data.starts_with(UpdateAuthority::SPL_DISCRIMINATOR_SLICE);
        if ix.program_id != *token_program || !is_update {
            return Err(BuildError::invalid_order(format!(
                "instruction {idx} must be a metadata field or authority update"
            )));
        }
    }

    Ok(())
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_init_order(
    _instructions: &[Instruction],
    _token_program: &Pubkey,
) -> Result<(), BuildError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spl_token_2022::instruction::TokenInstruction;
    use spl_token_metadata_interface::instruction::TokenMetadataInstruction;

    fn sample_metadata(mint: &Pubkey, authority: &Pubkey) -> TokenMetadata {
        TokenMetadata {
            update_authority: Some(*authority).try_into().unwrap(),
            mint: *mint,
            name: "Mark 1".to_string(),
            symbol: "MARK1".to_string(),
            uri: "https://example.com/mark1.json".to_string(),
            additional_metadata: vec![
                ("Background".to_string(), "Blue".to_string()),
                ("Coolness".to_string(), "100".to_string()),
                ("Sarcasm".to_string(), "100".to_string()),
            ],
        }
    }

    fn sample_requirements() -> AccountRequirements {
        AccountRequirements {
            space: 500,
            rent_lamports: 4_000_000,
        }
    }

    #[test]
    fn init_plan_is_protocol_ordered() {
        let token_program = spl_token_2022::id();
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let metadata = sample_metadata(&mint, &authority);

        let plan = plan_init_instructions(
            &token_program,
            &InitPlanParams {
                payer: &payer,
                mint: &mint,
                mint_authority: &authority,
                update_authority: &authority,
                decimals: 0,
                requirements: sample_requirements(),
                metadata: &metadata,
            },
        )
        .unwrap();

        // create + pointer + mint init + metadata init + 3 field updates
        assert_eq!(plan.len(), 7);
        sanity_check_init_order(&plan, &token_program).unwrap();
    }

    #[test]
    fn init_plan_applies_additional_fields_in_order() {
        let token_program = spl_token_2022::id();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let metadata = sample_metadata(&mint, &authority);

        let plan = plan_init_instructions(
            &token_program,
            &InitPlanParams {
                payer: &Pubkey::new_unique(),
                mint: &mint,
                mint_authority: &authority,
                update_authority: &authority,
                decimals: 0,
                requirements: sample_requirements(),
                metadata: &metadata,
            },
        )
        .unwrap();

        let expected = ["Background", "Coolness", "Sarcasm"];
        for (offset, expected_key) in expected.iter().enumerate() {
            let ix = &plan[4 + offset];
            match TokenMetadataInstruction::unpack(&ix.data).unwrap() {
                TokenMetadataInstruction::UpdateField(update) => {
                    assert_eq!(update.field, Field::Key(expected_key.to_string()));
                }
                other => panic!("expected UpdateField, got {other:?}"),
            }
        }
    }

    #[test]
    fn init_plan_transfers_update_authority_when_requested() {
        let token_program = spl_token_2022::id();
        let mint = Pubkey::new_unique();
        let issuer = Pubkey::new_unique();
        let custodian = Pubkey::new_unique();
        let metadata = sample_metadata(&mint, &custodian);

        let plan = plan_init_instructions(
            &token_program,
            &InitPlanParams {
                payer: &issuer,
                mint: &mint,
                mint_authority: &issuer,
                update_authority: &custodian,
                decimals: 0,
                requirements: sample_requirements(),
                metadata: &metadata,
            },
        )
        .unwrap();

        // Last instruction hands the metadata authority to the custodian.
        let last = plan.last().unwrap();
        match TokenMetadataInstruction::unpack(&last.data).unwrap() {
            TokenMetadataInstruction::UpdateAuthority(update) => {
                assert_eq!(
                    Option::<Pubkey>::from(update.new_authority),
                    Some(custodian)
                );
            }
            other => panic!("expected UpdateAuthority, got {other:?}"),
        }
        sanity_check_init_order(&plan, &token_program).unwrap();
    }

    #[test]
    fn init_plan_rejects_default_mint() {
        let token_program = spl_token_2022::id();
        let authority = Pubkey::new_unique();
        let mint = Pubkey::default();
        let metadata = sample_metadata(&mint, &authority);

        let result = plan_init_instructions(
            &token_program,
            &InitPlanParams {
                payer: &Pubkey::new_unique(),
                mint: &mint,
                mint_authority: &authority,
                update_authority: &authority,
                decimals: 0,
                requirements: sample_requirements(),
                metadata: &metadata,
            },
        );
        assert!(matches!(result, Err(BuildError::UninitializedMint)));
    }

    #[test]
    fn mint_plan_derives_the_associated_account() {
        let token_program = spl_token_2022::id();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let (token_account, plan) = plan_mint_instructions(
            &token_program,
            &Pubkey::new_unique(),
            &mint,
            &owner,
            &Pubkey::new_unique(),
            500,
        )
        .unwrap();

        assert_eq!(
            token_account,
            get_associated_token_address_with_program_id(&owner, &mint, &token_program)
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].program_id, spl_associated_token_account::id());
        // CreateIdempotent, not plain Create
        assert_eq!(plan[0].data, vec![1]);

        match TokenInstruction::unpack(&plan[1].data).unwrap() {
            TokenInstruction::MintTo { amount } => assert_eq!(amount, 500),
            other => panic!("expected MintTo, got {other:?}"),
        }
    }

    #[test]
    fn mint_plan_rejects_zero_amount() {
        let result = plan_mint_instructions(
            &spl_token_2022::id(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            0,
        );
        assert!(matches!(result, Err(BuildError::Configuration(_))));
    }

    #[test]
    fn revoke_plan_sets_no_holder() {
        let plan = plan_revoke_instructions(
            &spl_token_2022::id(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &AuthorityDisposition::Revoke,
        )
        .unwrap();
        assert_eq!(plan.len(), 1);

        match TokenInstruction::unpack(&plan[0].data).unwrap() {
            TokenInstruction::SetAuthority {
                authority_type,
                new_authority,
            } => {
                assert_eq!(authority_type, AuthorityType::MintTokens);
                assert!(new_authority.is_none());
            }
            other => panic!("expected SetAuthority, got {other:?}"),
        }
    }

    #[test]
    fn revoke_plan_supports_custodian_transfer() {
        let custodian = Pubkey::new_unique();
        let plan = plan_revoke_instructions(
            &spl_token_2022::id(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &AuthorityDisposition::Custodian(custodian),
        )
        .unwrap();

        match TokenInstruction::unpack(&plan[0].data).unwrap() {
            TokenInstruction::SetAuthority { new_authority, .. } => {
                assert_eq!(Option::<Pubkey>::from(new_authority.clone()), Some(custodian));
            }
            other => panic!("expected SetAuthority, got {other:?}"),
        }
    }

    #[test]
    fn sanity_check_rejects_metadata_before_mint_init() {
        let token_program = spl_token_2022::id();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let metadata = sample_metadata(&mint, &authority);

        let mut plan = plan_init_instructions(
            &token_program,
            &InitPlanParams {
                payer: &Pubkey::new_unique(),
                mint: &mint,
                mint_authority: &authority,
                update_authority: &authority,
                decimals: 0,
                requirements: sample_requirements(),
                metadata: &metadata,
            },
        )
        .unwrap();

        // Metadata record initialization before mint initialization
        plan.swap(2, 3);
        let result = sanity_check_init_order(&plan, &token_program);
        assert!(matches!(result, Err(BuildError::InvalidInstructionOrder(_))));
    }

    #[test]
    fn sanity_check_rejects_empty_plan() {
        let result = sanity_check_init_order(&[], &spl_token_2022::id());
        assert!(matches!(result, Err(BuildError::InvalidInstructionOrder(_))));
    }
}
