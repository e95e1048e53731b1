//! Mintforge - Token-2022 NFT issuance workflow
//!
//! Creates a mint with embedded metadata (via the metadata-pointer
//! extension), mints a fixed supply to an owner's associated token
//! account, and then revokes or transfers the mint authority so the
//! supply is fixed forever.
//!
//! The library exposes each stage behind its own module so integration
//! tests and downstream tooling can drive them independently; the binary
//! wires them together from a TOML configuration.

pub mod config;
pub mod explorer;
pub mod orchestrator;
pub mod sizer;
pub mod submitter;
pub mod tx_builder;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use orchestrator::{IssuanceError, IssuanceOrchestrator, Phase, WorkflowState};
pub use types::{AuthorityDisposition, IssuanceReceipt, IssuanceRequest, MetadataSpec};
