//! In-memory ledger double for workflow tests
//!
//! [`MockLedger`] implements [`LedgerRpc`] by decoding every submitted
//! transaction and enforcing the same semantics the token program would:
//! rent-exempt funding, extension initialization before mint
//! initialization, mint initialization before the metadata record,
//! signer checks on authority-gated instructions, and terminal authority
//! revocation. Transactions apply atomically; a rejected instruction
//! leaves the ledger untouched.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction::SystemInstruction;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use spl_token_2022::extension::ExtensionType;
use spl_token_2022::instruction::{AuthorityType, TokenInstruction};
use spl_token_2022::state::Mint;
use spl_token_metadata_interface::instruction::TokenMetadataInstruction;
use spl_token_metadata_interface::state::{Field, TokenMetadata};

use crate::submitter::{LedgerRpc, SubmissionError};

/// Mint account state tracked by the mock.
#[derive(Debug, Clone, Default)]
pub struct MockMint {
    pub space: usize,
    pub lamports: u64,
    pub pointer_initialized: bool,
    pub pointer_metadata_address: Option<Pubkey>,
    pub initialized: bool,
    pub decimals: u8,
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub metadata: Option<TokenMetadata>,
    pub metadata_update_authority: Option<Pubkey>,
}

/// Token account state tracked by the mock.
#[derive(Debug, Clone)]
pub struct MockTokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Pubkey, u64>,
    mints: HashMap<Pubkey, MockMint>,
    token_accounts: HashMap<Pubkey, MockTokenAccount>,
    confirmed: Vec<Signature>,
    attempted: Vec<Signature>,
    send_attempts: u32,
    token_account_creations: u32,
    fail_sends: u32,
    stale_sends: u32,
    fail_after_apply: u32,
}

/// In-memory [`LedgerRpc`] double.
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a system account, bypassing the airdrop path.
    pub fn credit(&self, account: &Pubkey, lamports: u64) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(*account).or_insert(0) += lamports;
    }

    /// Inject `count` transient transport failures into upcoming sends.
    /// The failed sends never reach the ledger.
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().unwrap().fail_sends = count;
    }

    /// Inject `count` stale-blockhash rejections into upcoming sends.
    pub fn expire_next_sends(&self, count: u32) {
        self.state.lock().unwrap().stale_sends = count;
    }

    /// Inject `count` ambiguous send failures: the transaction is applied
    /// and its status becomes visible, but the send call itself reports a
    /// transport timeout.
    pub fn fail_next_sends_after_apply(&self, count: u32) {
        self.state.lock().unwrap().fail_after_apply = count;
    }

    pub fn send_attempts(&self) -> u32 {
        self.state.lock().unwrap().send_attempts
    }

    /// Signatures of every send attempt, in order, including failed ones.
    pub fn attempted_signatures(&self) -> Vec<Signature> {
        self.state.lock().unwrap().attempted.clone()
    }

    /// Number of token accounts actually created (idempotent re-creates
    /// do not count).
    pub fn token_account_creations(&self) -> u32 {
        self.state.lock().unwrap().token_account_creations
    }

    pub fn mint_state(&self, mint: &Pubkey) -> Option<MockMint> {
        self.state.lock().unwrap().mints.get(mint).cloned()
    }

    pub fn token_account(&self, address: &Pubkey) -> Option<MockTokenAccount> {
        self.state.lock().unwrap().token_accounts.get(address).cloned()
    }

    pub fn system_balance(&self, account: &Pubkey) -> u64 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    fn reject(reason: impl Into<String>) -> SubmissionError {
        SubmissionError::Rejected {
            reason: reason.into(),
        }
    }

    fn required_metadata_space(metadata: &TokenMetadata) -> Result<usize, SubmissionError> {
        let base = ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer])
            .map_err(|e| Self::reject(format!("extension layout: {e}")))?;
        let tlv = metadata
            .tlv_size_of()
            .map_err(|e| Self::reject(format!("metadata layout: {e}")))?;
        Ok(base + tlv)
    }

    /// Execute every instruction against a scratch copy, committing only
    /// when all of them succeed.
    fn apply(&self, transaction: &Transaction) -> Result<(), SubmissionError> {
        transaction
            .verify()
            .map_err(|e| Self::reject(format!("signature verification: {e}")))?;

        let message = &transaction.message;
        let mut scratch = {
            let state = self.state.lock().unwrap();
            LedgerState {
                balances: state.balances.clone(),
                mints: state.mints.clone(),
                token_accounts: state.token_accounts.clone(),
                ..LedgerState::default()
            }
        };

        for instruction in &message.instructions {
            let program = message.account_keys[instruction.program_id_index as usize];
            let keys: Vec<Pubkey> = instruction
                .accounts
                .iter()
                .map(|&idx| message.account_keys[idx as usize])
                .collect();

            if program == system_program::id() {
                Self::apply_system(&mut scratch, message, &keys, &instruction.data)?;
            } else if program == spl_token_2022::id() {
                Self::apply_token(&mut scratch, message, &keys, &instruction.data)?;
            } else if program == spl_associated_token_account::id() {
                Self::apply_ata(&mut scratch, &keys, &instruction.data)?;
            } else {
                return Err(Self::reject(format!("unknown program {program}")));
            }
        }

        let mut state = self.state.lock().unwrap();
        state.balances = scratch.balances;
        state.mints = scratch.mints;
        state.token_accounts = scratch.token_accounts;
        state.token_account_creations += scratch.token_account_creations;
        Ok(())
    }

    fn is_signer(message: &Message, key: &Pubkey) -> bool {
        let signers = message.header.num_required_signatures as usize;
        message.account_keys.iter().take(signers).any(|k| k == key)
    }

    fn apply_system(
        state: &mut LedgerState,
        message: &Message,
        keys: &[Pubkey],
        data: &[u8],
    ) -> Result<(), SubmissionError> {
        let decoded: SystemInstruction = bincode::deserialize(data)
            .map_err(|e| Self::reject(format!("system instruction decode: {e}")))?;
        match decoded {
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                let funder = keys[0];
                let new_account = keys[1];
                if !Self::is_signer(message, &new_account) {
                    return Err(Self::reject("new account must sign its creation"));
                }
                if state.mints.contains_key(&new_account) {
                    return Err(Self::reject("account already exists"));
                }
                if owner != spl_token_2022::id() {
                    return Err(Self::reject("unexpected account owner"));
                }
                let space = space as usize;
                if lamports < Rent::default().minimum_balance(space) {
                    return Err(Self::reject("account is not rent exempt"));
                }
                let balance = state.balances.entry(funder).or_insert(0);
                if *balance < lamports {
                    return Err(Self::reject("insufficient funds for account creation"));
                }
                *balance -= lamports;
                state.mints.insert(
                    new_account,
                    MockMint {
                        space,
                        lamports,
                        ..MockMint::default()
                    },
                );
                Ok(())
            }
            other => Err(Self::reject(format!(
                "unsupported system instruction {other:?}"
            ))),
        }
    }

    fn apply_token(
        state: &mut LedgerState,
        message: &Message,
        keys: &[Pubkey],
        data: &[u8],
    ) -> Result<(), SubmissionError> {
        // Metadata-interface instructions share the program id with token
        // instructions; their 8-byte discriminators never collide with the
        // 1-byte token tags in practice, so try them first.
        if let Ok(decoded) = TokenMetadataInstruction::unpack(data) {
            return Self::apply_metadata(state, message, keys, decoded);
        }

        // Metadata-pointer sub-instructions are not modeled by
        // TokenInstruction::unpack; handle the initialize case raw.
        if data.first() == Some(&39) {
            if data.get(1) != Some(&0) || data.len() < 66 {
                return Err(Self::reject("unsupported metadata pointer instruction"));
            }
            let mint_key = keys[0];
            let metadata_address = Pubkey::try_from(&data[34..66])
                .map_err(|_| Self::reject("metadata pointer address decode"))?;
            let mint = state
                .mints
                .get_mut(&mint_key)
                .ok_or_else(|| Self::reject("pointer init before account creation"))?;
            if mint.initialized {
                return Err(Self::reject("pointer init after mint init"));
            }
            mint.pointer_initialized = true;
            mint.pointer_metadata_address = Some(metadata_address);
            return Ok(());
        }

        let decoded = TokenInstruction::unpack(data)
            .map_err(|e| Self::reject(format!("token instruction decode: {e}")))?;
        match decoded {
            TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                ..
            } => {
                let mint_key = keys[0];
                let mint = state
                    .mints
                    .get_mut(&mint_key)
                    .ok_or_else(|| Self::reject("mint init before account creation"))?;
                if mint.initialized {
                    return Err(Self::reject("mint already initialized"));
                }
                // The account was sized for the pointer extension, so the
                // extension must be initialized first.
                if !mint.pointer_initialized {
                    return Err(Self::reject("mint init before pointer init"));
                }
                mint.initialized = true;
                mint.decimals = decimals;
                mint.mint_authority = Some(mint_authority);
                Ok(())
            }
            TokenInstruction::MintTo { amount } => {
                let mint_key = keys[0];
                let destination = keys[1];
                let authority = keys[2];
                if !Self::is_signer(message, &authority) {
                    return Err(Self::reject("mint authority must sign"));
                }
                let mint = state
                    .mints
                    .get_mut(&mint_key)
                    .ok_or_else(|| Self::reject("mint_to on unknown mint"))?;
                if !mint.initialized {
                    return Err(Self::reject("mint_to before mint init"));
                }
                match mint.mint_authority {
                    Some(current) if current == authority => {}
                    Some(_) => return Err(Self::reject("wrong mint authority")),
                    None => return Err(Self::reject("mint authority has been revoked")),
                }
                let account = state
                    .token_accounts
                    .get_mut(&destination)
                    .ok_or_else(|| Self::reject("mint_to into missing token account"))?;
                if account.mint != mint_key {
                    return Err(Self::reject("token account belongs to another mint"));
                }
                mint.supply += amount;
                account.amount += amount;
                Ok(())
            }
            TokenInstruction::SetAuthority {
                authority_type,
                new_authority,
            } => {
                if authority_type != AuthorityType::MintTokens {
                    return Err(Self::reject("unsupported authority type"));
                }
                let mint_key = keys[0];
                let authority = keys[1];
                if !Self::is_signer(message, &authority) {
                    return Err(Self::reject("current authority must sign"));
                }
                let mint = state
                    .mints
                    .get_mut(&mint_key)
                    .ok_or_else(|| Self::reject("set_authority on unknown mint"))?;
                match mint.mint_authority {
                    Some(current) if current == authority => {}
                    Some(_) => return Err(Self::reject("wrong mint authority")),
                    None => return Err(Self::reject("mint authority already revoked")),
                }
                mint.mint_authority = Option::<Pubkey>::from(new_authority);
                Ok(())
            }
            other => Err(Self::reject(format!(
                "unsupported token instruction {other:?}"
            ))),
        }
    }

    fn apply_metadata(
        state: &mut LedgerState,
        message: &Message,
        keys: &[Pubkey],
        decoded: TokenMetadataInstruction,
    ) -> Result<(), SubmissionError> {
        match decoded {
            TokenMetadataInstruction::Initialize(init) => {
                let metadata_key = keys[0];
                let update_authority = keys[1];
                let mint_key = keys[2];
                let mint_authority = keys[3];
                if !Self::is_signer(message, &mint_authority) {
                    return Err(Self::reject("mint authority must sign metadata init"));
                }
                let mint = state
                    .mints
                    .get_mut(&mint_key)
                    .ok_or_else(|| Self::reject("metadata init on unknown mint"))?;
                if !mint.initialized {
                    return Err(Self::reject("metadata init before mint init"));
                }
                if mint.pointer_metadata_address != Some(metadata_key) {
                    return Err(Self::reject("metadata pointer does not target this account"));
                }
                if mint.mint_authority != Some(mint_authority) {
                    return Err(Self::reject("wrong mint authority for metadata init"));
                }
                if mint.metadata.is_some() {
                    return Err(Self::reject("metadata already initialized"));
                }

                let metadata = TokenMetadata {
                    update_authority: Some(update_authority)
                        .try_into()
                        .map_err(|_| Self::reject("invalid update authority"))?,
                    mint: mint_key,
                    name: init.name,
                    symbol: init.symbol,
                    uri: init.uri,
                    additional_metadata: vec![],
                };
                if mint.space < Self::required_metadata_space(&metadata)? {
                    return Err(Self::reject("mint account too small for metadata"));
                }
                mint.metadata = Some(metadata);
                mint.metadata_update_authority = Some(update_authority);
                Ok(())
            }
            TokenMetadataInstruction::UpdateField(update) => {
                let metadata_key = keys[0];
                let authority = keys[1];
                if !Self::is_signer(message, &authority) {
                    return Err(Self::reject("update authority must sign field update"));
                }
                let mint = state
                    .mints
                    .get_mut(&metadata_key)
                    .ok_or_else(|| Self::reject("field update on unknown mint"))?;
                if mint.metadata_update_authority != Some(authority) {
                    return Err(Self::reject("wrong metadata update authority"));
                }
                let metadata = mint
                    .metadata
                    .as_mut()
                    .ok_or_else(|| Self::reject("field update before metadata init"))?;

                match update.field {
                    Field::Name => metadata.name = update.value,
                    Field::Symbol => metadata.symbol = update.value,
                    Field::Uri => metadata.uri = update.value,
                    Field::Key(key) => {
                        if let Some(pair) =
                            metadata.additional_metadata.iter_mut().find(|(k, _)| *k == key)
                        {
                            pair.1 = update.value;
                        } else {
                            metadata.additional_metadata.push((key, update.value));
                        }
                    }
                }
                let required = Self::required_metadata_space(metadata)?;
                if mint.space < required {
                    return Err(Self::reject("mint account too small for updated metadata"));
                }
                Ok(())
            }
            TokenMetadataInstruction::UpdateAuthority(update) => {
                let metadata_key = keys[0];
                let authority = keys[1];
                if !Self::is_signer(message, &authority) {
                    return Err(Self::reject("update authority must sign transfer"));
                }
                let mint = state
                    .mints
                    .get_mut(&metadata_key)
                    .ok_or_else(|| Self::reject("authority update on unknown mint"))?;
                if mint.metadata_update_authority != Some(authority) {
                    return Err(Self::reject("wrong metadata update authority"));
                }
                let metadata = mint
                    .metadata
                    .as_mut()
                    .ok_or_else(|| Self::reject("authority update before metadata init"))?;
                metadata.update_authority = update.new_authority;
                mint.metadata_update_authority = Option::<Pubkey>::from(update.new_authority);
                Ok(())
            }
            other => Err(Self::reject(format!(
                "unsupported metadata instruction {other:?}"
            ))),
        }
    }

    fn apply_ata(
        state: &mut LedgerState,
        keys: &[Pubkey],
        data: &[u8],
    ) -> Result<(), SubmissionError> {
        // [0] = Create, [1] = CreateIdempotent
        let idempotent = match data {
            [0] => false,
            [1] => true,
            other => {
                return Err(Self::reject(format!(
                    "unsupported associated token instruction {other:?}"
                )))
            }
        };

        let ata = keys[1];
        let owner = keys[2];
        let mint_key = keys[3];
        if !state.mints.get(&mint_key).is_some_and(|m| m.initialized) {
            return Err(Self::reject("token account for uninitialized mint"));
        }
        if state.token_accounts.contains_key(&ata) {
            if idempotent {
                return Ok(());
            }
            return Err(Self::reject("token account already exists"));
        }
        state.token_accounts.insert(
            ata,
            MockTokenAccount {
                mint: mint_key,
                owner,
                amount: 0,
            },
        );
        state.token_account_creations += 1;
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn minimum_balance_for_rent_exemption(
        &self,
        space: usize,
    ) -> Result<u64, SubmissionError> {
        Ok(Rent::default().minimum_balance(space))
    }

    async fn latest_blockhash(&self) -> Result<Hash, SubmissionError> {
        Ok(Hash::new_unique())
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64, SubmissionError> {
        Ok(self.system_balance(account))
    }

    async fn request_airdrop(
        &self,
        account: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, SubmissionError> {
        self.credit(account, lamports);
        let signature = Signature::new_unique();
        self.state.lock().unwrap().confirmed.push(signature);
        Ok(signature)
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, SubmissionError> {
        let signature = transaction.signatures[0];
        let fail_after = {
            let mut state = self.state.lock().unwrap();
            state.send_attempts += 1;
            state.attempted.push(signature);
            if state.fail_sends > 0 {
                state.fail_sends -= 1;
                return Err(SubmissionError::Transport {
                    endpoint: "mock".to_string(),
                    message: "injected transport failure".to_string(),
                });
            }
            if state.stale_sends > 0 {
                state.stale_sends -= 1;
                return Err(SubmissionError::BlockhashNotFound {
                    endpoint: "mock".to_string(),
                });
            }
            // A signature the ledger already processed is never applied
            // again; the resubmission just reports it.
            if state.confirmed.contains(&signature) {
                return Ok(signature);
            }
            if state.fail_after_apply > 0 {
                state.fail_after_apply -= 1;
                true
            } else {
                false
            }
        };

        self.apply(transaction)?;
        self.state.lock().unwrap().confirmed.push(signature);
        if fail_after {
            return Err(SubmissionError::Timeout {
                endpoint: "mock".to_string(),
                timeout_ms: 0,
            });
        }
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SubmissionError> {
        let state = self.state.lock().unwrap();
        if !state.confirmed.contains(signature) {
            return Ok(None);
        }
        Ok(Some(TransactionStatus {
            slot: state.confirmed.len() as u64,
            confirmations: None,
            status: Ok(()),
            err: None,
            confirmation_status: Some(TransactionConfirmationStatus::Finalized),
        }))
    }
}
