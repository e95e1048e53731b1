//! Mint account sizing and rent-exemption funding
//!
//! The mint account must be created at its final size: the base layout for
//! the declared extension set, plus the metadata TLV entry (discriminator
//! and length header followed by the Borsh-serialized payload). Under-sizing
//! is a protocol-level defect the ledger rejects; it is never truncated or
//! papered over here.

use spl_token_2022::extension::ExtensionType;
use spl_token_2022::state::Mint;
use spl_token_metadata_interface::state::TokenMetadata;
use thiserror::Error;
use tracing::debug;

use crate::submitter::{LedgerRpc, SubmissionError};

/// Space and funding needed for the mint account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRequirements {
    /// Total account size in bytes.
    pub space: usize,
    /// Minimum balance making `space` bytes rent-exempt.
    pub rent_lamports: u64,
}

#[derive(Debug, Error)]
pub enum SizerError {
    /// The extension set or metadata payload does not form a valid layout
    #[error("account layout error: {0}")]
    Layout(String),

    /// Rent-exemption query failed; fatal, not retried here
    #[error("rent exemption query failed: {0}")]
    Rent(#[from] SubmissionError),

    /// The ledger reported a zero rent-exempt balance, which would leave
    /// the account reclaimable
    #[error("ledger reported zero rent-exempt balance for {0} bytes")]
    ZeroRent(usize),
}

/// Total mint account size for `extensions` plus the embedded `metadata`.
///
/// Pure layout computation; guaranteed to be at least the base size plus
/// the serialized metadata, so the payload always fits verbatim.
pub fn required_space(
    extensions: &[ExtensionType],
    metadata: &TokenMetadata,
) -> Result<usize, SizerError> {
    let base = ExtensionType::try_calculate_account_len::<Mint>(extensions)
        .map_err(|e| SizerError::Layout(format!("extension set: {e}")))?;
    let metadata_tlv = metadata
        .tlv_size_of()
        .map_err(|e| SizerError::Layout(format!("metadata payload: {e}")))?;
    base.checked_add(metadata_tlv)
        .ok_or_else(|| SizerError::Layout("account size overflow".to_string()))
}

/// Compute the space and rent-exempt funding for the mint account.
///
/// Queries the ledger's rent rule exactly once; a transport failure is
/// propagated as-is (the caller decides whether the workflow survives).
pub async fn compute_requirements(
    ledger: &dyn LedgerRpc,
    extensions: &[ExtensionType],
    metadata: &TokenMetadata,
) -> Result<AccountRequirements, SizerError> {
    let space = required_space(extensions, metadata)?;
    let rent_lamports = ledger.minimum_balance_for_rent_exemption(space).await?;
    if rent_lamports == 0 {
        return Err(SizerError::ZeroRent(space));
    }

    debug!(space, rent_lamports, "Computed mint account requirements");
    Ok(AccountRequirements {
        space,
        rent_lamports,
    })
}
