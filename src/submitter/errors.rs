//! Error taxonomy and retry policy for transaction submission

use solana_client::client_error::ClientError;
use thiserror::Error;

/// Errors surfaced by the submission layer.
///
/// Transient transport conditions are retryable within the configured
/// budget; explicit ledger rejections are fatal and carry the original
/// diagnostic untouched.
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    /// The blockhash the transaction was signed against is unknown or stale
    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    /// Payer cannot cover fees or rent; requires external remediation
    #[error("Insufficient funds: {message}")]
    InsufficientFunds { message: String },

    /// Explicit rejection by the ledger. The ledger guarantees no partial
    /// state mutation occurred; never retried.
    #[error("Transaction rejected by ledger: {reason}")]
    Rejected { reason: String },

    /// Confirmation polling exhausted its deadline
    #[error("Confirmation timed out after {timeout_ms}ms for {signature}")]
    ConfirmationTimeout { signature: String, timeout_ms: u64 },

    /// Internal invariant violation (signing failure, empty plan)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    /// Check if this error is retryable at the submission layer
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Timeout { .. } => true,
            Self::RateLimited { .. } => true,
            Self::BlockhashNotFound { .. } => true,

            Self::InsufficientFunds { .. } => false,
            Self::Rejected { .. } => false,
            Self::ConfirmationTimeout { .. } => false,
            Self::Internal(_) => false,
        }
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limit",
            Self::BlockhashNotFound { .. } => "blockhash",
            Self::InsufficientFunds { .. } => "funding",
            Self::Rejected { .. } => "rejected",
            Self::ConfirmationTimeout { .. } => "confirmation",
            Self::Internal(_) => "internal",
        }
    }

    /// Classify a `ClientError` from the RPC transport.
    ///
    /// The RPC client flattens most failure detail into its message, so
    /// classification is by message content, with an explicit-rejection
    /// fallback only for preflight/instruction errors.
    pub fn from_client_error(err: &ClientError, endpoint: &str) -> Self {
        let err_str = err.to_string();
        let lowered = err_str.to_lowercase();

        if lowered.contains("blockhash not found") {
            Self::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            }
        } else if lowered.contains("insufficient funds")
            || lowered.contains("insufficient lamports")
        {
            Self::InsufficientFunds { message: err_str }
        } else if lowered.contains("rate limit")
            || lowered.contains("too many requests")
            || lowered.contains("429")
        {
            Self::RateLimited {
                endpoint: endpoint.to_string(),
            }
        } else if lowered.contains("timeout") || lowered.contains("timed out") {
            Self::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else if lowered.contains("invalid")
            || lowered.contains("custom program error")
            || lowered.contains("missing signature")
            || lowered.contains("preflight")
            || lowered.contains("instructionerror")
        {
            Self::Rejected { reason: err_str }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                message: err_str,
            }
        }
    }
}

/// Retry policy for transient submission failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when the budget is spent.
    ///
    /// `attempt` is zero-based: the delay after the first failed attempt is
    /// `calculate_delay(0)`.
    pub fn calculate_delay(&self, attempt: u32) -> Option<std::time::Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        // Jitter to avoid thundering herd on a recovering endpoint
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(std::time::Duration::from_millis(jittered_delay))
    }

    /// Single attempt, no retries.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Fast retries with no delay, for deterministic tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(SubmissionError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(SubmissionError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 5000,
        }
        .is_retryable());

        assert!(SubmissionError::BlockhashNotFound {
            endpoint: "test".to_string(),
        }
        .is_retryable());

        assert!(!SubmissionError::Rejected {
            reason: "invalid instruction data".to_string(),
        }
        .is_retryable());

        assert!(!SubmissionError::InsufficientFunds {
            message: "0 lamports".to_string(),
        }
        .is_retryable());

        assert!(!SubmissionError::ConfirmationTimeout {
            signature: "sig".to_string(),
            timeout_ms: 60_000,
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SubmissionError::Rejected {
                reason: "x".to_string()
            }
            .category(),
            "rejected"
        );
        assert_eq!(
            SubmissionError::Transport {
                endpoint: "e".to_string(),
                message: "m".to_string()
            }
            .category(),
            "transport"
        );
        assert_eq!(SubmissionError::Internal("x".to_string()).category(), "internal");
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy::default();

        let delay1 = policy.calculate_delay(0);
        assert!(delay1.is_some());

        let delay2 = policy.calculate_delay(1);
        assert!(delay2.is_some());

        // Budget spent after max_attempts
        assert!(policy.calculate_delay(policy.max_attempts).is_none());
    }

    #[test]
    fn test_retry_policy_no_retries() {
        let policy = RetryPolicy::no_retries();
        assert!(policy.calculate_delay(0).is_none());
    }

    #[test]
    fn test_retry_policy_immediate() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(
            policy.calculate_delay(0),
            Some(std::time::Duration::from_millis(0))
        );
        assert_eq!(
            policy.calculate_delay(1),
            Some(std::time::Duration::from_millis(0))
        );
        assert!(policy.calculate_delay(2).is_none());
    }
}
