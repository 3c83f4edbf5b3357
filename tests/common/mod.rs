//! Shared test doubles for coordinator integration tests.

#![allow(dead_code)]

use alloy::primitives::{Address, TxHash, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Semaphore};

use transfer_ledger::blockchain::provider::{
    ProviderEvent, ProviderRequest, ProviderRpcError, WalletProvider,
};
use transfer_ledger::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use transfer_ledger::coordinator::WalletTransactionCoordinator;
use transfer_ledger::ledger::{LedgerContract, LedgerEntry, RawTransfer};
use transfer_ledger::storage::LocalStorage;

pub const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

pub fn account() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn recipient() -> Address {
    Address::repeat_byte(0xbb)
}

/// Scripted wallet: approves or rejects prompts and records every request.
pub struct MockProvider {
    available: Vec<Address>,
    authorized: Mutex<Vec<Address>>,
    approve: AtomicBool,
    send_error: Mutex<Option<ProviderRpcError>>,
    requests: Mutex<Vec<ProviderRequest>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockProvider {
    pub fn new(available: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            available,
            authorized: Mutex::new(Vec::new()),
            approve: AtomicBool::new(true),
            send_error: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Start with every available account already authorized.
    pub fn authorized(self) -> Self {
        *self.authorized.lock().unwrap() = self.available.clone();
        self
    }

    /// Decline every prompt.
    pub fn rejecting(self) -> Self {
        self.approve.store(false, Ordering::SeqCst);
        self
    }

    pub fn fail_sends_with(&self, err: ProviderRpcError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent_transactions(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, ProviderRequest::SendTransaction(_)))
            .count()
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderRpcError> {
        self.requests.lock().unwrap().push(request.clone());

        match request {
            ProviderRequest::Accounts => Ok(json!(*self.authorized.lock().unwrap())),
            ProviderRequest::RequestAccounts => {
                if !self.approve.load(Ordering::SeqCst) {
                    return Err(ProviderRpcError::user_rejected());
                }
                *self.authorized.lock().unwrap() = self.available.clone();
                Ok(json!(self.available))
            }
            ProviderRequest::SendTransaction(_) => {
                if !self.approve.load(Ordering::SeqCst) {
                    return Err(ProviderRpcError::user_rejected());
                }
                if let Some(err) = self.send_error.lock().unwrap().clone() {
                    return Err(err);
                }
                Ok(json!(B256::repeat_byte(0x11)))
            }
        }
    }

    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}

/// In-memory ledger. Confirmation can be held back with [`MockLedger::gated`].
pub struct MockLedger {
    records: Mutex<Vec<RawTransfer>>,
    pending: Mutex<Vec<(TxHash, RawTransfer)>>,
    fail_add: AtomicBool,
    reject_add: AtomicBool,
    revert: AtomicBool,
    gate: Semaphore,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::with_gate(Semaphore::MAX_PERMITS)
    }

    /// Confirmations wait until [`release`](Self::release) is called.
    pub fn gated() -> Self {
        Self::with_gate(0)
    }

    fn with_gate(permits: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            fail_add: AtomicBool::new(false),
            reject_add: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            gate: Semaphore::new(permits),
        }
    }

    pub fn with_records(records: Vec<RawTransfer>) -> Self {
        let ledger = Self::new();
        *ledger.records.lock().unwrap() = records;
        ledger
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_adds(&self) {
        self.fail_add.store(true, Ordering::SeqCst);
    }

    /// Decline the ledger write as the wallet user would.
    pub fn reject_adds(&self) {
        self.reject_add.store(true, Ordering::SeqCst);
    }

    pub fn revert_confirmations(&self) {
        self.revert.store(true, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerContract for MockLedger {
    async fn add_to_blockchain(&self, from: Address, entry: &LedgerEntry) -> BlockchainResult<TxHash> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(BlockchainError::Contract("execution reverted".to_string()));
        }
        if self.reject_add.load(Ordering::SeqCst) {
            return Err(ProviderRpcError::user_rejected().into());
        }

        let mut pending = self.pending.lock().unwrap();
        let hash = B256::repeat_byte(0x20 + pending.len() as u8);
        pending.push((
            hash,
            RawTransfer {
                sender: from,
                receiver: entry.receiver,
                amount: entry.amount,
                message: entry.message.clone(),
                timestamp: U256::ZERO,
                keyword: entry.keyword.clone(),
            },
        ));
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;
        permit.forget();

        let entry = {
            let mut pending = self.pending.lock().unwrap();
            let idx = pending
                .iter()
                .position(|(hash, _)| *hash == tx_hash)
                .ok_or_else(|| BlockchainError::Rpc("unknown transaction".to_string()))?;
            pending.remove(idx).1
        };

        if self.revert.load(Ordering::SeqCst) {
            return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let mut entry = entry;
        entry.timestamp = U256::from(1_700_000_000u64 + records.len() as u64);
        records.push(entry);
        Ok(ConfirmationStatus::Confirmed {
            block_number: records.len() as u64,
        })
    }

    async fn get_all_transactions(&self) -> BlockchainResult<Vec<RawTransfer>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn get_transaction_count(&self) -> BlockchainResult<u64> {
        Ok(self.records.lock().unwrap().len() as u64)
    }
}

/// Coordinator over the given doubles and in-memory storage.
pub fn coordinator(
    provider: Option<Arc<MockProvider>>,
    ledger: Arc<MockLedger>,
) -> Arc<WalletTransactionCoordinator> {
    let provider = provider.map(|p| p as Arc<dyn WalletProvider>);
    Arc::new(WalletTransactionCoordinator::new(
        provider,
        ledger,
        LocalStorage::in_memory(),
    ))
}

/// Fill the form with a valid transfer of `amount` ether.
pub fn fill_form(coordinator: &WalletTransactionCoordinator, amount: &str) {
    use transfer_ledger::coordinator::FormField;

    coordinator.update_form_field(FormField::AddressTo, recipient().to_string());
    coordinator.update_form_field(FormField::Amount, amount);
    coordinator.update_form_field(FormField::Keyword, "coffee");
    coordinator.update_form_field(FormField::Message, "thanks");
}
