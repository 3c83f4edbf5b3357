//! Coordinator error taxonomy.

use thiserror::Error;

use crate::blockchain::provider::{codes, ProviderRpcError};
use crate::blockchain::types::BlockchainError;
use crate::storage::StorageError;

/// Why a coordinator operation failed.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No wallet provider is attached.
    #[error("No wallet provider available; install or attach a wallet to continue")]
    ProviderUnavailable,

    /// The user declined a connection or transaction prompt.
    #[error("Request rejected by user: {0}")]
    UserRejected(String),

    /// A provider or contract call failed for any other reason.
    #[error("{method} failed: {source}")]
    ChainCallFailed {
        method: &'static str,
        #[source]
        source: BlockchainError,
    },

    /// An operation needs a connected account.
    #[error("No wallet account connected")]
    NotConnected,

    #[error("Invalid recipient address '{0}'")]
    InvalidRecipient(String),

    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("Unknown form field '{0}'")]
    UnknownField(String),

    /// Another `submit_transfer` is still running.
    #[error("A transfer is already in progress")]
    TransferInProgress,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CoordinatorError {
    /// Classify a provider error: user rejections keep their own variant.
    pub fn from_provider(method: &'static str, err: ProviderRpcError) -> Self {
        if err.is_user_rejection() {
            CoordinatorError::UserRejected(err.message)
        } else {
            CoordinatorError::ChainCallFailed {
                method,
                source: err.into(),
            }
        }
    }

    pub fn chain(method: &'static str, source: BlockchainError) -> Self {
        match source {
            BlockchainError::Provider { code, message } if code == codes::USER_REJECTED => {
                CoordinatorError::UserRejected(message)
            }
            source => CoordinatorError::ChainCallFailed { method, source },
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::ProviderUnavailable => "provider_unavailable",
            CoordinatorError::UserRejected(_) => "user_rejected",
            CoordinatorError::ChainCallFailed { .. } => "chain_call_failed",
            CoordinatorError::NotConnected => "not_connected",
            CoordinatorError::InvalidRecipient(_) => "invalid_recipient",
            CoordinatorError::InvalidAmount { .. } => "invalid_amount",
            CoordinatorError::UnknownField(_) => "unknown_field",
            CoordinatorError::TransferInProgress => "in_progress",
            CoordinatorError::Storage(_) => "storage",
        }
    }
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_user_rejection_keeps_its_variant() {
        let err = CoordinatorError::from_provider("eth_requestAccounts", ProviderRpcError::user_rejected());
        assert!(matches!(err, CoordinatorError::UserRejected(_)));
        assert_eq!(err.kind(), "user_rejected");
    }

    #[test]
    fn test_other_provider_errors_carry_cause() {
        let err = CoordinatorError::from_provider(
            "eth_sendTransaction",
            ProviderRpcError::internal("insufficient funds for gas"),
        );
        assert!(err.to_string().starts_with("eth_sendTransaction failed"));
        let source = err.source().unwrap().to_string();
        assert!(source.contains("insufficient funds"));
        assert!(source.contains(&codes::INTERNAL.to_string()));
    }

    #[test]
    fn test_rejected_contract_call_is_user_rejection() {
        let err = CoordinatorError::chain("addToBlockchain", ProviderRpcError::user_rejected().into());
        assert!(matches!(err, CoordinatorError::UserRejected(_)));

        let err = CoordinatorError::chain(
            "addToBlockchain",
            ProviderRpcError::unauthorized("Account has not been authorized").into(),
        );
        assert!(matches!(err, CoordinatorError::ChainCallFailed { .. }));
    }
}
