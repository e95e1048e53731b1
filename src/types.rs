//! Common types used throughout the issuance workflow

use solana_sdk::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use spl_token_metadata_interface::state::TokenMetadata;

/// Target of the final mint-authority reassignment.
///
/// The workflow always ends by moving the mint authority away from the
/// issuing wallet; whether that means "no holder at all" or "a custodian
/// address" is a product decision carried in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityDisposition {
    /// Set the mint authority to no holder. Terminal: no further minting
    /// is possible by anyone.
    Revoke,
    /// Reassign the mint authority to a custodian address.
    Custodian(Pubkey),
}

impl AuthorityDisposition {
    /// The new authority holder, as expected by `set_authority`.
    pub fn new_authority(&self) -> Option<&Pubkey> {
        match self {
            Self::Revoke => None,
            Self::Custodian(pubkey) => Some(pubkey),
        }
    }
}

/// Declarative description of the embedded token metadata.
///
/// `additional` preserves insertion order; each pair becomes its own
/// update-field instruction in the init transaction, applied in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSpec {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    /// Final metadata update authority. `None` leaves it with the issuer.
    pub update_authority: Option<Pubkey>,
    pub additional: Vec<(String, String)>,
}

impl MetadataSpec {
    /// Build the on-chain metadata record for a given mint.
    ///
    /// The record is used both for sizing the mint account and for the
    /// instruction payloads, so the two can never disagree.
    pub fn to_token_metadata(
        &self,
        mint: &Pubkey,
        issuer: &Pubkey,
    ) -> Result<TokenMetadata, ProgramError> {
        let update_authority = self.update_authority.unwrap_or(*issuer);
        Ok(TokenMetadata {
            update_authority: Some(update_authority).try_into()?,
            mint: *mint,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            uri: self.uri.clone(),
            additional_metadata: self.additional.clone(),
        })
    }

    /// The metadata update authority that ends up on-chain.
    pub fn final_update_authority(&self, issuer: &Pubkey) -> Pubkey {
        self.update_authority.unwrap_or(*issuer)
    }
}

/// Immutable description of one issuance run.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    /// Token decimals; 0 is the non-fungible convention.
    pub decimals: u8,
    /// Units to mint, exactly once. Not scaled by decimals.
    pub amount: u64,
    /// Owner of the associated token account receiving the minted units.
    pub owner: Pubkey,
    pub metadata: MetadataSpec,
    pub disposition: AuthorityDisposition,
}

/// Externally observable results of a completed workflow.
#[derive(Debug, Clone)]
pub struct IssuanceReceipt {
    /// Freshly generated mint address.
    pub mint: Pubkey,
    /// Associated token account holding the minted units.
    pub token_account: Pubkey,
    pub init_signature: Signature,
    pub mint_signature: Signature,
    pub revoke_signature: Signature,
}

impl IssuanceReceipt {
    /// Transaction identifiers in confirmation order, for audit trails.
    pub fn signatures(&self) -> [Signature; 3] {
        [
            self.init_signature,
            self.mint_signature,
            self.revoke_signature,
        ]
    }
}
