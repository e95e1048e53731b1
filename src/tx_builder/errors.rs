//! Error types for transaction assembly
//!
//! Builder errors are precondition violations: they indicate a logic or
//! configuration defect, never a transient condition, so none of them are
//! retryable.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// A transaction plan ended up with zero instructions
    #[error("transaction plan '{label}' has no instructions")]
    EmptyPlan { label: &'static str },

    /// An instruction referenced the default (uninitialized) mint address
    #[error("mint address is uninitialized")]
    UninitializedMint,

    /// Failed to build an instruction for a specific program
    #[error("instruction build error (program={program}): {reason}")]
    InstructionBuild { program: String, reason: String },

    /// Instruction sequence violates the protocol-mandated ordering
    #[error("invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Invalid request values (zero amount, bad authority, ...)
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BuildError {
    /// Builder failures are deterministic; retrying never helps.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyPlan { .. } => "empty_plan",
            Self::UninitializedMint => "mint",
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidInstructionOrder(_) => "ordering",
            Self::Configuration(_) => "config",
        }
    }

    pub fn instruction_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuildError::EmptyPlan { label: "init" };
        assert_eq!(err.to_string(), "transaction plan 'init' has no instructions");

        let err = BuildError::instruction_failed("spl-token-2022", "invalid authority");
        assert_eq!(
            err.to_string(),
            "instruction build error (program=spl-token-2022): invalid authority"
        );
    }

    #[test]
    fn test_never_retryable() {
        assert!(!BuildError::UninitializedMint.is_retryable());
        assert!(!BuildError::invalid_order("test").is_retryable());
        assert!(!BuildError::Configuration("test".to_string()).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(BuildError::UninitializedMint.category(), "mint");
        assert_eq!(BuildError::invalid_order("x").category(), "ordering");
    }
}
