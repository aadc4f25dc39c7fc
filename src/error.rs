//! Error taxonomy shared by the wallet, agents and orchestrator.

use thiserror::Error;

use crate::blockchain::types::ChainError;
use crate::security::SecurityIssue;

/// Errors raised by orchestrator components.
///
/// Every fallible component method reports one of these kinds. Only the
/// orchestrator converts them into a uniform action result.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Establishing a wallet connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The operation requires a connected wallet.
    #[error("Wallet not connected")]
    NotConnected,

    /// Caller input was rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A high-severity static finding blocked the operation.
    #[error("Security check failed: {}", summarize(.0))]
    Security(Vec<SecurityIssue>),

    /// The compiler reported at least one error diagnostic.
    #[error("Compilation failed: {0}")]
    Compilation(String),

    /// No client is configured for the requested chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    /// Broadcast, confirmation or revert failure.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A result could not be rendered for the caller.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn summarize(issues: &[SecurityIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.title.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ChainError> for AgentError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Wallet(msg) => AgentError::Connection(msg),
            ChainError::NotAvailable(msg) => AgentError::Connection(msg),
            other => AgentError::Transaction(other.to_string()),
        }
    }
}

/// Result type for orchestrator components.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Severity;

    #[test]
    fn test_security_error_lists_titles() {
        let err = AgentError::Security(vec![SecurityIssue {
            severity: Severity::High,
            title: "Self-destruct".to_string(),
            description: String::new(),
            location: None,
        }]);
        assert_eq!(err.to_string(), "Security check failed: Self-destruct");
    }

    #[test]
    fn test_chain_error_conversion() {
        let err: AgentError = ChainError::Reverted("out of gas".to_string()).into();
        assert!(matches!(err, AgentError::Transaction(_)));
        assert!(err.to_string().contains("out of gas"));

        let err: AgentError = ChainError::Wallet("bad key".to_string()).into();
        assert!(matches!(err, AgentError::Connection(_)));
    }
}
