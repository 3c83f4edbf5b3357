//! EIP-1193 style wallet provider interface.
//!
//! The coordinator never talks to a node directly for wallet operations; it
//! sends requests through a [`WalletProvider`] and decodes the JSON results.
//! Any wallet bridge (local node, browser extension bridge, test double) can
//! sit behind this trait.

use alloy::primitives::{Address, TxHash, U256, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::blockchain::types::{BlockchainError, BlockchainResult, TRANSFER_GAS_LIMIT};

/// Standard EIP-1193 and JSON-RPC error codes.
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
}

/// Parameters of an `eth_sendTransaction` native-currency transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    /// Gas limit, serialized as a hex quantity.
    pub gas: U64,
    /// Amount in wei, serialized as a hex quantity.
    pub value: U256,
}

impl TransferRequest {
    /// A plain transfer with the fixed 21000 gas limit.
    pub fn new(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to,
            gas: U64::from(TRANSFER_GAS_LIMIT),
            value,
        }
    }
}

/// A request understood by wallet providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRequest {
    /// `eth_accounts`: already-authorized accounts, never prompts.
    Accounts,
    /// `eth_requestAccounts`: asks the user to authorize accounts.
    RequestAccounts,
    /// `eth_sendTransaction` with a single transfer.
    SendTransaction(TransferRequest),
}

impl ProviderRequest {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            ProviderRequest::Accounts => "eth_accounts",
            ProviderRequest::RequestAccounts => "eth_requestAccounts",
            ProviderRequest::SendTransaction(_) => "eth_sendTransaction",
        }
    }

    /// JSON-RPC params array.
    pub fn params(&self) -> Value {
        match self {
            ProviderRequest::Accounts | ProviderRequest::RequestAccounts => json!([]),
            ProviderRequest::SendTransaction(tx) => json!([tx]),
        }
    }

    /// Wire form `{ "method": ..., "params": [...] }`.
    pub fn to_json(&self) -> Value {
        json!({ "method": self.method(), "params": self.params() })
    }
}

/// Error returned by a provider, shaped like an EIP-1193 `ProviderRpcError`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(codes::USER_REJECTED, "User rejected the request.")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, message)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == codes::USER_REJECTED
    }
}

impl From<ProviderRpcError> for BlockchainError {
    fn from(err: ProviderRpcError) -> Self {
        BlockchainError::Provider {
            code: err.code,
            message: err.message,
        }
    }
}

/// Change notifications emitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed; empty means locked or revoked.
    AccountsChanged(Vec<Address>),
    /// The provider switched networks.
    ChainChanged(u64),
    /// The provider lost its connection to every chain.
    Disconnected,
}

/// An injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Submit a request and return its raw JSON result.
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderRpcError>;

    /// Subscribe to account and chain changes, if the provider emits them.
    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}

/// Decode an `eth_accounts` / `eth_requestAccounts` result.
pub fn decode_accounts(value: Value) -> BlockchainResult<Vec<Address>> {
    serde_json::from_value(value)
        .map_err(|e| BlockchainError::Decode(format!("Invalid accounts response: {}", e)))
}

/// Decode an `eth_sendTransaction` result.
pub fn decode_tx_hash(value: Value) -> BlockchainResult<TxHash> {
    serde_json::from_value(value)
        .map_err(|e| BlockchainError::Decode(format!("Invalid transaction hash: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_send_transaction_wire_format() {
        let from = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        let to = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
        let request = ProviderRequest::SendTransaction(TransferRequest::new(
            from,
            to,
            U256::from(1_000_000_000_000_000_000u64),
        ));

        let wire = request.to_json();
        assert_eq!(wire["method"], "eth_sendTransaction");
        let tx = &wire["params"][0];
        assert_eq!(tx["gas"], "0x5208");
        assert_eq!(tx["value"], "0xde0b6b3a7640000");
        assert_eq!(
            tx["to"].as_str().unwrap().to_lowercase(),
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn test_account_requests_have_empty_params() {
        assert_eq!(ProviderRequest::Accounts.method(), "eth_accounts");
        assert_eq!(ProviderRequest::RequestAccounts.method(), "eth_requestAccounts");
        assert_eq!(ProviderRequest::Accounts.params(), json!([]));
    }

    #[test]
    fn test_decode_accounts() {
        let accounts = decode_accounts(json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"])).unwrap();
        assert_eq!(accounts, vec![address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")]);

        assert!(decode_accounts(json!("nope")).is_err());
        assert!(decode_accounts(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_rejection_code() {
        assert!(ProviderRpcError::user_rejected().is_user_rejection());
        assert!(!ProviderRpcError::internal("boom").is_user_rejection());

        let err: BlockchainError = ProviderRpcError::unauthorized("not connected").into();
        assert!(matches!(err, BlockchainError::Provider { code: codes::UNAUTHORIZED, .. }));
    }
}
