//! Init-transaction ordering tests
//!
//! The ledger double enforces the same ordering rules the token program
//! does; these tests prove the planned order passes and every reordering
//! is rejected without leaving partial state behind.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use spl_token_2022::extension::ExtensionType;
use spl_token_metadata_interface::state::TokenMetadata;

use crate::sizer::{self, AccountRequirements};
use crate::submitter::SubmissionError;
use crate::tests::test_helpers::{funded_setup, sample_request};
use crate::tx_builder::instructions::plan_init_instructions;
use crate::tx_builder::InitPlanParams;

async fn init_fixture() -> (
    std::sync::Arc<crate::test_utils::MockLedger>,
    crate::submitter::SubmissionClient,
    crate::wallet::IssuerWallet,
    Keypair,
    TokenMetadata,
    AccountRequirements,
) {
    let (ledger, client, wallet) = funded_setup();
    let mint_keypair = Keypair::new();
    let request = sample_request(Pubkey::new_unique());
    let metadata = request
        .metadata
        .to_token_metadata(&mint_keypair.pubkey(), &wallet.pubkey())
        .unwrap();
    let requirements = sizer::compute_requirements(
        ledger.as_ref(),
        &[ExtensionType::MetadataPointer],
        &metadata,
    )
    .await
    .unwrap();
    (ledger, client, wallet, mint_keypair, metadata, requirements)
}

#[tokio::test]
async fn planned_order_is_accepted() {
    let (ledger, client, wallet, mint_keypair, metadata, requirements) = init_fixture().await;
    let issuer = wallet.pubkey();
    let mint = mint_keypair.pubkey();

    let instructions = plan_init_instructions(
        &spl_token_2022::id(),
        &InitPlanParams {
            payer: &issuer,
            mint: &mint,
            mint_authority: &issuer,
            update_authority: &issuer,
            decimals: 0,
            requirements,
            metadata: &metadata,
        },
    )
    .unwrap();

    client
        .submit_and_confirm("init", &instructions, &issuer, &[wallet.keypair(), &mint_keypair])
        .await
        .unwrap();

    let state = ledger.mint_state(&mint).unwrap();
    assert!(state.pointer_initialized);
    assert!(state.initialized);
    assert_eq!(state.decimals, 0);
    let stored = state.metadata.unwrap();
    assert_eq!(stored.name, "Mark 1");
    assert_eq!(stored.additional_metadata.len(), 3);
    assert_eq!(stored.additional_metadata[0].0, "Background");
}

#[tokio::test]
async fn mint_init_before_pointer_init_is_rejected() {
    let (ledger, client, wallet, mint_keypair, metadata, requirements) = init_fixture().await;
    let issuer = wallet.pubkey();
    let mint = mint_keypair.pubkey();

    let mut instructions = plan_init_instructions(
        &spl_token_2022::id(),
        &InitPlanParams {
            payer: &issuer,
            mint: &mint,
            mint_authority: &issuer,
            update_authority: &issuer,
            decimals: 0,
            requirements,
            metadata: &metadata,
        },
    )
    .unwrap();
    instructions.swap(1, 2);

    let err = client
        .submit_and_confirm("init", &instructions, &issuer, &[wallet.keypair(), &mint_keypair])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Rejected { .. }));
    // Rejections are fatal: no retry despite the available budget.
    assert_eq!(ledger.send_attempts(), 1);
    // Atomicity: the failed transaction left nothing behind.
    assert!(ledger.mint_state(&mint).is_none());
}

#[tokio::test]
async fn metadata_init_before_mint_init_is_rejected() {
    let (ledger, client, wallet, mint_keypair, metadata, requirements) = init_fixture().await;
    let issuer = wallet.pubkey();
    let mint = mint_keypair.pubkey();

    let mut instructions = plan_init_instructions(
        &spl_token_2022::id(),
        &InitPlanParams {
            payer: &issuer,
            mint: &mint,
            mint_authority: &issuer,
            update_authority: &issuer,
            decimals: 0,
            requirements,
            metadata: &metadata,
        },
    )
    .unwrap();
    instructions.swap(2, 3);

    let err = client
        .submit_and_confirm("init", &instructions, &issuer, &[wallet.keypair(), &mint_keypair])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Rejected { .. }));
    assert!(ledger.mint_state(&mint).is_none());
}

#[tokio::test]
async fn undersized_account_is_rejected_atomically() {
    let (ledger, client, wallet, mint_keypair, metadata, _) = init_fixture().await;
    let issuer = wallet.pubkey();
    let mint = mint_keypair.pubkey();

    // Base layout only, no room for the metadata record.
    let base =
        spl_token_2022::extension::ExtensionType::try_calculate_account_len::<
            spl_token_2022::state::Mint,
        >(&[ExtensionType::MetadataPointer])
        .unwrap();
    let requirements = AccountRequirements {
        space: base,
        rent_lamports: solana_sdk::rent::Rent::default().minimum_balance(base),
    };

    let instructions = plan_init_instructions(
        &spl_token_2022::id(),
        &InitPlanParams {
            payer: &issuer,
            mint: &mint,
            mint_authority: &issuer,
            update_authority: &issuer,
            decimals: 0,
            requirements,
            metadata: &metadata,
        },
    )
    .unwrap();

    let err = client
        .submit_and_confirm("init", &instructions, &issuer, &[wallet.keypair(), &mint_keypair])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Rejected { .. }));
    assert!(ledger.mint_state(&mint).is_none());
}

#[tokio::test]
async fn minting_against_an_uninitialized_mint_is_rejected() {
    let (_ledger, client, wallet, _mint_keypair, _metadata, _requirements) = init_fixture().await;
    let issuer = wallet.pubkey();
    let phantom_mint = Pubkey::new_unique();

    let (_, instructions) = crate::tx_builder::instructions::plan_mint_instructions(
        &spl_token_2022::id(),
        &issuer,
        &phantom_mint,
        &Pubkey::new_unique(),
        &issuer,
        500,
    )
    .unwrap();

    let err = client
        .submit_and_confirm("mint", &instructions, &issuer, &[wallet.keypair()])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Rejected { .. }));
}
