//! Issuance transaction assembly
//!
//! Turns an issuance request into three deterministic transaction plans:
//! init (create and initialize the mint with embedded metadata), mint
//! (idempotent token-account creation plus the supply mint), and revoke
//! (mint-authority reassignment). Assembly never touches the network;
//! everything here is pure and unit-testable.

pub mod builder;
pub mod errors;
pub mod instructions;

pub use builder::{IssuanceTxBuilder, TransactionPlan};
pub use errors::BuildError;
pub use instructions::{sanity_check_init_order, InitPlanParams};
