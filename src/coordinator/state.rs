//! Published coordinator state.

use alloy::primitives::{Address, TxHash};
use serde::Serialize;

use crate::coordinator::form::TransferForm;
use crate::ledger::types::TransactionRecord;

/// Snapshot of everything a UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorState {
    /// Connected account; `None` while disconnected.
    pub current_account: Option<Address>,
    /// Last chain reported by the provider.
    pub chain_id: Option<u64>,
    pub form: TransferForm,
    /// Ledger history, replaced wholesale on refresh.
    pub transactions: Vec<TransactionRecord>,
    /// True while a ledger transaction awaits confirmation.
    pub is_loading: bool,
    pub transaction_count: Option<u64>,
}

impl CoordinatorState {
    pub fn is_connected(&self) -> bool {
        self.current_account.is_some()
    }
}

/// Outcome of a confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    /// Hash of the native-currency transfer.
    pub transfer_hash: TxHash,
    /// Hash of the `addToBlockchain` transaction.
    pub ledger_hash: TxHash,
    /// Block the ledger transaction landed in.
    pub block_number: u64,
}
