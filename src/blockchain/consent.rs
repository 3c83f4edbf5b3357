//! User consent and account authorization.
//!
//! Every state-changing request, whether a value transfer or a contract
//! call, goes through a [`ConsentPrompt`] and must come from an account
//! listed under [`AUTHORIZED_ACCOUNTS_KEY`].

use alloy::primitives::Address;

use crate::blockchain::provider::{ProviderRpcError, TransferRequest};
use crate::storage::{LocalStorage, StorageError};

/// Storage key holding the JSON array of authorized accounts.
pub const AUTHORIZED_ACCOUNTS_KEY: &str = "authorizedAccounts";

/// A contract write awaiting the user's approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub from: Address,
    pub contract: Address,
    /// Solidity function name, e.g. `addToBlockchain`.
    pub function: &'static str,
    /// Human-readable arguments.
    pub summary: String,
}

/// User consent hook, the equivalent of a wallet's confirmation popup.
pub trait ConsentPrompt: Send + Sync {
    /// Allow this client to see and use `accounts`.
    fn approve_connection(&self, accounts: &[Address]) -> bool;

    /// Sign and broadcast a value transfer.
    fn approve_transaction(&self, request: &TransferRequest) -> bool;

    /// Sign and broadcast a contract call.
    fn approve_contract_call(&self, call: &ContractCall) -> bool;
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ConsentPrompt for AutoApprove {
    fn approve_connection(&self, _accounts: &[Address]) -> bool {
        true
    }

    fn approve_transaction(&self, _request: &TransferRequest) -> bool {
        true
    }

    fn approve_contract_call(&self, _call: &ContractCall) -> bool {
        true
    }
}

/// Accounts the user has authorized, as remembered in `storage`.
///
/// A corrupt entry reads as no authorization.
pub fn authorized_accounts(storage: &LocalStorage) -> Vec<Address> {
    storage
        .get_item(AUTHORIZED_ACCOUNTS_KEY)
        .and_then(|raw| match serde_json::from_str(&raw) {
            Ok(accounts) => Some(accounts),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring corrupt authorized accounts entry");
                None
            }
        })
        .unwrap_or_default()
}

pub fn store_authorized_accounts(storage: &LocalStorage, accounts: &[Address]) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(accounts)?;
    storage.set_item(AUTHORIZED_ACCOUNTS_KEY, encoded)
}

/// Fail with `4100 Unauthorized` unless `account` is authorized.
pub fn ensure_authorized(storage: &LocalStorage, account: Address) -> Result<(), ProviderRpcError> {
    if authorized_accounts(storage).contains(&account) {
        Ok(())
    } else {
        Err(ProviderRpcError::unauthorized(format!(
            "Account {} has not been authorized",
            account
        )))
    }
}
