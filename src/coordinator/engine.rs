//! The wallet/transaction coordinator.

use alloy::primitives::Address;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::blockchain::provider::{
    decode_accounts, decode_tx_hash, ProviderEvent, ProviderRequest, TransferRequest, WalletProvider,
};
use crate::blockchain::types::{BlockchainError, ConfirmationStatus};
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::form::{FormField, TransferForm};
use crate::coordinator::state::{CoordinatorState, TransferReceipt};
use crate::ledger::contract::LedgerContract;
use crate::ledger::types::{LedgerEntry, TransactionRecord};
use crate::observability::metrics;
use crate::storage::LocalStorage;

/// Storage key caching the ledger's record count.
pub const TRANSACTION_COUNT_KEY: &str = "transactionCount";

/// Owns wallet session, form and history state, and drives the wallet
/// provider and ledger contract on behalf of the UI.
pub struct WalletTransactionCoordinator {
    provider: ArcSwapOption<Arc<dyn WalletProvider>>,
    ledger: Arc<dyn LedgerContract>,
    storage: LocalStorage,
    state: watch::Sender<CoordinatorState>,
    submit_lock: Mutex<()>,
}

/// Clears the loading flag when dropped, so a failed or cancelled
/// confirmation wait never leaves it set.
struct LoadingGuard<'a>(&'a watch::Sender<CoordinatorState>);

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<CoordinatorState>) -> Self {
        state.send_modify(|s| s.is_loading = true);
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.is_loading = false);
    }
}

impl WalletTransactionCoordinator {
    /// Create a coordinator. `provider` may be `None` and attached later.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        ledger: Arc<dyn LedgerContract>,
        storage: LocalStorage,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            provider: ArcSwapOption::new(provider.map(Arc::new)),
            ledger,
            storage,
            state,
            submit_lock: Mutex::new(()),
        }
    }

    /// Install or replace the wallet provider.
    pub fn attach_provider(&self, provider: Arc<dyn WalletProvider>) {
        self.provider.store(Some(Arc::new(provider)));
        tracing::info!("Wallet provider attached");
    }

    /// Remove the wallet provider. The session is left as is.
    pub fn detach_provider(&self) {
        self.provider.store(None);
        tracing::info!("Wallet provider detached");
    }

    pub fn has_provider(&self) -> bool {
        self.provider.load().is_some()
    }

    fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider.load_full().map(|slot| Arc::clone(&*slot))
    }

    fn require_provider(&self) -> CoordinatorResult<Arc<dyn WalletProvider>> {
        self.provider().ok_or(CoordinatorError::ProviderUnavailable)
    }

    async fn fetch_accounts(
        &self,
        provider: &dyn WalletProvider,
        request: ProviderRequest,
    ) -> CoordinatorResult<Vec<Address>> {
        let method = request.method();
        let value = provider
            .request(request)
            .await
            .map_err(|e| CoordinatorError::from_provider(method, e))?;
        decode_accounts(value).map_err(|e| CoordinatorError::chain(method, e))
    }

    fn set_account(&self, account: Option<Address>) {
        self.state.send_if_modified(|s| {
            if s.current_account == account {
                return false;
            }
            s.current_account = account;
            true
        });
    }

    /// Look for an account the wallet already authorized, without prompting.
    ///
    /// Never fails: a missing provider or a provider error degrades to no
    /// session and is logged.
    pub async fn check_existing_connection(&self) -> Option<Address> {
        let Some(provider) = self.provider() else {
            tracing::warn!("No wallet provider detected; install or attach a wallet to continue");
            return None;
        };

        match self.fetch_accounts(provider.as_ref(), ProviderRequest::Accounts).await {
            Ok(accounts) => {
                let account = accounts.first().copied();
                self.set_account(account);
                match account {
                    Some(account) => tracing::info!(account = %account, "Existing wallet connection found"),
                    None => tracing::info!("No authorized accounts found"),
                }
                account
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not check existing wallet connection");
                None
            }
        }
    }

    /// Ask the wallet to authorize an account and start a session with it.
    pub async fn connect(&self) -> CoordinatorResult<Address> {
        let provider = self.require_provider()?;

        let accounts = match self
            .fetch_accounts(provider.as_ref(), ProviderRequest::RequestAccounts)
            .await
        {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(error = %e, "Wallet connection failed");
                return Err(e);
            }
        };

        let account = accounts.first().copied().ok_or_else(|| {
            CoordinatorError::chain(
                "eth_requestAccounts",
                BlockchainError::Decode("Provider returned no accounts".to_string()),
            )
        })?;

        self.set_account(Some(account));
        tracing::info!(account = %account, "Wallet connected");
        Ok(account)
    }

    /// Set one form field, keeping the rest.
    pub fn update_form_field(&self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        self.state.send_modify(|s| s.form.set(field, value));
    }

    /// Set a form field by its input name (`addressTo`, `amount`, `keyword`, `message`).
    pub fn update_form_field_by_name(&self, name: &str, value: impl Into<String>) -> CoordinatorResult<()> {
        let field: FormField = name.parse()?;
        self.update_form_field(field, value);
        Ok(())
    }

    pub fn reset_form(&self) {
        self.state.send_modify(|s| s.form = TransferForm::default());
    }

    /// Send the transfer described by the form and record it on the ledger.
    ///
    /// The loading flag is raised once the ledger transaction is dispatched
    /// and cleared when it settles. On success the form is reset and the
    /// count and history are refreshed. Concurrent calls fail with
    /// [`CoordinatorError::TransferInProgress`].
    pub async fn submit_transfer(&self) -> CoordinatorResult<TransferReceipt> {
        let _submitting = self
            .submit_lock
            .try_lock()
            .map_err(|_| CoordinatorError::TransferInProgress)?;

        let result = self.run_transfer().await;
        match &result {
            Ok(receipt) => {
                metrics::record_transfer("confirmed");
                tracing::info!(
                    transfer_hash = %receipt.transfer_hash,
                    ledger_hash = %receipt.ledger_hash,
                    block_number = receipt.block_number,
                    "Transfer recorded"
                );
            }
            Err(e) => {
                metrics::record_transfer(e.kind());
                tracing::error!(error = %e, "Transfer failed");
            }
        }
        result
    }

    async fn run_transfer(&self) -> CoordinatorResult<TransferReceipt> {
        let provider = self.require_provider()?;
        let from = self.current_account().ok_or(CoordinatorError::NotConnected)?;
        let submitted = self.form();
        let transfer = submitted.validate()?;

        let request = TransferRequest::new(from, transfer.to, transfer.amount);
        let value = provider
            .request(ProviderRequest::SendTransaction(request))
            .await
            .map_err(|e| CoordinatorError::from_provider("eth_sendTransaction", e))?;
        let transfer_hash =
            decode_tx_hash(value).map_err(|e| CoordinatorError::chain("eth_sendTransaction", e))?;
        tracing::debug!(tx_hash = %transfer_hash, "Value transfer submitted");

        let entry = LedgerEntry {
            receiver: transfer.to,
            amount: transfer.amount,
            message: transfer.message,
            keyword: transfer.keyword,
        };
        let ledger_hash = self
            .ledger
            .add_to_blockchain(from, &entry)
            .await
            .map_err(|e| CoordinatorError::chain("addToBlockchain", e))?;

        let status = {
            let _loading = LoadingGuard::start(&self.state);
            tracing::info!(tx_hash = %ledger_hash, "Awaiting ledger confirmation");
            self.ledger.wait_for_confirmation(ledger_hash).await
        };

        let block_number = match status.map_err(|e| CoordinatorError::chain("addToBlockchain", e))? {
            ConfirmationStatus::Confirmed { block_number } => block_number,
            ConfirmationStatus::Failed(reason) => {
                return Err(CoordinatorError::chain(
                    "addToBlockchain",
                    BlockchainError::Reverted(reason),
                ))
            }
        };

        // Keep anything typed while the confirmation was pending.
        let cleared = self.state.send_if_modified(|s| {
            if s.form != submitted {
                return false;
            }
            s.form = TransferForm::default();
            true
        });
        if !cleared {
            tracing::debug!("Form edited during confirmation; leaving it as is");
        }
        if let Err(e) = self.refresh_transaction_count().await {
            tracing::warn!(error = %e, "Transfer confirmed but count refresh failed");
        }
        if let Err(e) = self.refresh_transaction_history().await {
            tracing::warn!(error = %e, "Transfer confirmed but history refresh failed");
        }

        Ok(TransferReceipt {
            transfer_hash,
            ledger_hash,
            block_number,
        })
    }

    /// Re-read every ledger record and replace the published list.
    ///
    /// Records that cannot be converted are skipped and logged.
    pub async fn refresh_transaction_history(&self) -> CoordinatorResult<Vec<TransactionRecord>> {
        let raw = self
            .ledger
            .get_all_transactions()
            .await
            .map_err(|e| CoordinatorError::chain("getAllTransactions", e))?;

        let records: Vec<TransactionRecord> = raw
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match TransactionRecord::from_raw(record) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed ledger record");
                    None
                }
            })
            .collect();

        metrics::record_history_size(records.len());
        tracing::debug!(records = records.len(), "Transaction history refreshed");

        let published = records.clone();
        self.state.send_modify(|s| s.transactions = published);
        Ok(records)
    }

    /// Read the ledger's record count and persist it under [`TRANSACTION_COUNT_KEY`].
    pub async fn refresh_transaction_count(&self) -> CoordinatorResult<u64> {
        let count = self
            .ledger
            .get_transaction_count()
            .await
            .map_err(|e| CoordinatorError::chain("getTransactionCount", e))?;

        self.storage.set_item(TRANSACTION_COUNT_KEY, count.to_string())?;
        self.state.send_modify(|s| s.transaction_count = Some(count));
        Ok(count)
    }

    /// Count persisted by an earlier [`refresh_transaction_count`](Self::refresh_transaction_count).
    pub fn stored_transaction_count(&self) -> Option<u64> {
        self.storage
            .get_item(TRANSACTION_COUNT_KEY)
            .and_then(|raw| raw.parse().ok())
    }

    /// Restore the session and, if there is anything to show, the history.
    pub async fn load_on_startup(&self) {
        let account = self.check_existing_connection().await;

        let cached = self.stored_transaction_count();
        if cached.is_some() {
            self.state.send_modify(|s| s.transaction_count = cached);
        }

        if account.is_some() || cached.unwrap_or(0) > 0 {
            if let Err(e) = self.refresh_transaction_history().await {
                tracing::warn!(error = %e, "Could not load transaction history on startup");
            }
        }
    }

    /// Apply a provider notification to the session.
    pub fn handle_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                let account = accounts.first().copied();
                tracing::info!(account = ?account, "Wallet accounts changed");
                self.set_account(account);
            }
            ProviderEvent::ChainChanged(chain_id) => {
                tracing::info!(chain_id, "Wallet network changed");
                self.state.send_modify(|s| {
                    s.chain_id = Some(chain_id);
                    s.transactions.clear();
                });
            }
            ProviderEvent::Disconnected => {
                tracing::warn!("Wallet provider disconnected");
                self.set_account(None);
            }
        }
    }

    /// Follow the attached provider's events until `shutdown` fires.
    ///
    /// Returns `None` when no provider is attached or it emits no events.
    pub fn watch_provider_events(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        let mut events = self.provider()?.events()?;
        let coordinator = Arc::clone(self);

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    event = events.recv() => match event {
                        Ok(event) => coordinator.handle_provider_event(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Missed provider events, re-reading accounts");
                            coordinator.check_existing_connection().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Provider event watcher stopped");
        }))
    }

    /// Current state snapshot.
    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn current_account(&self) -> Option<Address> {
        self.state.borrow().current_account
    }

    pub fn form(&self) -> TransferForm {
        self.state.borrow().form.clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.borrow().transactions.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }
}
