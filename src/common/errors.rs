//! Error types for the engine

use thiserror::Error;

use super::types::Amount;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure reported by a chain collaborator (reader or submitter)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Node unreachable or refusing requests
    #[error("Chain node unavailable: {0}")]
    Unavailable(String),

    /// Call did not complete in time
    #[error("Chain call timed out: {0}")]
    Timeout(String),

    /// Contract call reverted
    #[error("Contract call reverted: {0}")]
    Reverted(String),

    /// Value returned by the node did not have the expected shape
    #[error("Malformed chain value: {0}")]
    Malformed(String),
}

impl ChainError {
    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Unavailable(_) | ChainError::Timeout(_))
    }
}

/// Main error type for engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Refresh denied by the cooldown and nothing cached to fall back on
    #[error("Rate limited, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    /// One or more position reads failed and nothing cached to fall back on
    #[error("Position aggregation failed: {0}")]
    AggregationFailed(ChainError),

    /// Trade rejected before submission
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    /// Collateral approval for the market is below the trade's stake
    #[error("Insufficient allowance: {required} required, {approved} approved")]
    InsufficientAllowance { required: Amount, approved: Amount },

    /// Submitter failed to send or confirm a trade
    #[error("Trade submission failed: {0}")]
    SubmissionFailed(ChainError),

    /// Cache store I/O or serialization errors
    #[error("Cache store error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Cache(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Cache(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ChainError::Unavailable("down".into()).is_transient());
        assert!(ChainError::Timeout("slow".into()).is_transient());
        assert!(!ChainError::Reverted("nope".into()).is_transient());
        assert!(!ChainError::Malformed("tuple".into()).is_transient());
    }

    #[test]
    fn test_rate_limited_message() {
        let err = EngineError::RateLimited {
            retry_after_ms: 25_000,
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 25000 ms");
    }

    #[test]
    fn test_insufficient_allowance_message() {
        let err = EngineError::InsufficientAllowance {
            required: Amount::new(10),
            approved: Amount::new(4),
        };
        assert_eq!(err.to_string(), "Insufficient allowance: 10 required, 4 approved");
    }
}
