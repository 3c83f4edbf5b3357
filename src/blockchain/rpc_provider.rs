//! Wallet provider backed by a JSON-RPC node.
//!
//! Behaves like an injected browser wallet: accounts must be authorized
//! through `eth_requestAccounts` before `eth_accounts` reports them, every
//! transfer asks for consent, and the authorization is remembered in local
//! storage across restarts. Signing is done by a local key when one is
//! configured, otherwise by the node's unlocked accounts.
//!
//! [`RpcWalletProvider::spawn_monitor`] polls the node and turns network,
//! account and reachability changes into [`ProviderEvent`]s.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::consent::{
    self, ensure_authorized, store_authorized_accounts, ConsentPrompt, AUTHORIZED_ACCOUNTS_KEY,
};
use crate::blockchain::provider::{
    codes, ProviderEvent, ProviderRequest, ProviderRpcError, TransferRequest, WalletProvider,
};
use crate::blockchain::transaction::TxBuilder;
use crate::observability::metrics;
use crate::storage::{LocalStorage, StorageError};

/// What the wallet looked like at one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSnapshot {
    /// `None` when no endpoint answered.
    pub chain_id: Option<u64>,
    /// Authorized accounts the node can currently sign for.
    pub accounts: Vec<Address>,
}

impl WalletSnapshot {
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn is_reachable(&self) -> bool {
        self.chain_id.is_some()
    }
}

/// Events implied by moving from `prev` to `next`.
///
/// Losing the node yields a single `Disconnected`. Regaining it reports the
/// network and, if any, the accounts again.
pub fn snapshot_changes(prev: &WalletSnapshot, next: &WalletSnapshot) -> Vec<ProviderEvent> {
    let mut events = Vec::new();

    let Some(chain_id) = next.chain_id else {
        if prev.is_reachable() {
            events.push(ProviderEvent::Disconnected);
        }
        return events;
    };

    if prev.chain_id != Some(chain_id) {
        events.push(ProviderEvent::ChainChanged(chain_id));
    }
    if prev.accounts != next.accounts {
        events.push(ProviderEvent::AccountsChanged(next.accounts.clone()));
    }
    events
}

/// EIP-1193 provider over a [`BlockchainClient`].
pub struct RpcWalletProvider {
    tx_builder: TxBuilder,
    storage: LocalStorage,
    consent: Arc<dyn ConsentPrompt>,
    events: broadcast::Sender<ProviderEvent>,
}

impl RpcWalletProvider {
    pub fn new(client: BlockchainClient, storage: LocalStorage, consent: Arc<dyn ConsentPrompt>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            tx_builder: TxBuilder::new(client),
            storage,
            consent,
            events,
        }
    }

    /// Accounts the user has authorized, as remembered in storage.
    pub fn authorized_accounts(&self) -> Vec<Address> {
        consent::authorized_accounts(&self.storage)
    }

    /// Forget every authorization and notify subscribers.
    pub fn revoke(&self) -> Result<(), StorageError> {
        self.storage.remove_item(AUTHORIZED_ACCOUNTS_KEY)?;
        let _ = self.events.send(ProviderEvent::AccountsChanged(Vec::new()));
        tracing::info!("Wallet authorization revoked");
        Ok(())
    }

    fn client(&self) -> &BlockchainClient {
        self.tx_builder.client()
    }

    async fn available_accounts(&self) -> Result<Vec<Address>, ProviderRpcError> {
        self.client()
            .get_accounts()
            .await
            .map_err(|e| ProviderRpcError::new(codes::DISCONNECTED, e.to_string()))
    }

    /// Authorized accounts that are also available, in authorization order.
    async fn visible_accounts(&self) -> Result<Vec<Address>, ProviderRpcError> {
        let authorized = self.authorized_accounts();
        if authorized.is_empty() {
            return Ok(Vec::new());
        }

        let available = self.available_accounts().await?;
        Ok(authorized
            .into_iter()
            .filter(|account| available.contains(account))
            .collect())
    }

    async fn request_accounts(&self) -> Result<Value, ProviderRpcError> {
        let available = self.available_accounts().await?;
        if available.is_empty() {
            return Err(ProviderRpcError::internal("No accounts available on this node"));
        }

        let authorized = self.authorized_accounts();
        let already: Vec<Address> = available
            .iter()
            .copied()
            .filter(|account| authorized.contains(account))
            .collect();
        if !already.is_empty() {
            return Ok(json!(already));
        }

        if !self.consent.approve_connection(&available) {
            tracing::info!("Connection request rejected by user");
            return Err(ProviderRpcError::user_rejected());
        }

        store_authorized_accounts(&self.storage, &available)
            .map_err(|e| ProviderRpcError::internal(e.to_string()))?;

        let _ = self.events.send(ProviderEvent::AccountsChanged(available.clone()));
        tracing::info!(accounts = available.len(), "Accounts authorized");
        Ok(json!(available))
    }

    async fn send_transaction(&self, request: TransferRequest) -> Result<Value, ProviderRpcError> {
        ensure_authorized(&self.storage, request.from)?;

        if !self.consent.approve_transaction(&request) {
            tracing::info!(to = %request.to, "Transaction rejected by user");
            return Err(ProviderRpcError::user_rejected());
        }

        let tx = self
            .tx_builder
            .build_transfer(&request)
            .await
            .map_err(|e| ProviderRpcError::internal(e.to_string()))?;
        let tx_hash = self
            .client()
            .send_transaction(tx)
            .await
            .map_err(|e| ProviderRpcError::internal(e.to_string()))?;

        tracing::info!(tx_hash = %tx_hash, from = %request.from, to = %request.to, "Transfer broadcast");
        Ok(json!(tx_hash))
    }

    /// Read the current network and visible accounts.
    pub async fn snapshot(&self) -> WalletSnapshot {
        let chain_id = match self.client().get_chain_id().await {
            Ok(chain_id) => chain_id.0,
            Err(e) => {
                tracing::debug!(error = %e, "Wallet node unreachable");
                return WalletSnapshot::unreachable();
            }
        };

        match self.visible_accounts().await {
            Ok(accounts) => WalletSnapshot {
                chain_id: Some(chain_id),
                accounts,
            },
            Err(e) => {
                tracing::debug!(error = %e, "Wallet accounts unreadable");
                WalletSnapshot::unreachable()
            }
        }
    }

    /// Poll the node every `poll_interval` and publish what changed, until
    /// `shutdown` fires. The first poll only sets the baseline.
    pub fn spawn_monitor(
        self: &Arc<Self>,
        poll_interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let provider = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<WalletSnapshot> = None;

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        let next = provider.snapshot().await;
                        if let Some(prev) = &last {
                            for event in snapshot_changes(prev, &next) {
                                tracing::info!(event = ?event, "Wallet state changed");
                                let _ = provider.events.send(event);
                            }
                        }
                        last = Some(next);
                    }
                }
            }
            tracing::debug!("Wallet monitor stopped");
        })
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderRpcError> {
        let method = request.method();
        tracing::debug!(method, "Provider request");

        let result = match request {
            ProviderRequest::Accounts => self.visible_accounts().await.map(|accounts| json!(accounts)),
            ProviderRequest::RequestAccounts => self.request_accounts().await,
            ProviderRequest::SendTransaction(tx) => self.send_transaction(tx).await,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_user_rejection() => "rejected",
            Err(_) => "error",
        };
        metrics::record_provider_request(method, outcome);
        result
    }

    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::consent::{AutoApprove, ContractCall};
    use crate::blockchain::types::BlockchainConfig;
    use crate::blockchain::wallet::Wallet;
    use alloy::primitives::U256;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct Deny;

    impl ConsentPrompt for Deny {
        fn approve_connection(&self, _accounts: &[Address]) -> bool {
            false
        }

        fn approve_transaction(&self, _request: &TransferRequest) -> bool {
            false
        }

        fn approve_contract_call(&self, _call: &ContractCall) -> bool {
            false
        }
    }

    fn provider(consent: Arc<dyn ConsentPrompt>) -> (RpcWalletProvider, Wallet) {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let config = BlockchainConfig {
            rpc_url: "http://127.0.0.1:9".to_string(),
            rpc_timeout_secs: 1,
            ..BlockchainConfig::default()
        };
        let client = BlockchainClient::build(config, Some(&wallet)).unwrap();
        (RpcWalletProvider::new(client, LocalStorage::in_memory(), consent), wallet)
    }

    #[tokio::test]
    async fn test_accounts_empty_until_authorized() {
        let (provider, wallet) = provider(Arc::new(AutoApprove));
        let mut events = provider.events().unwrap();

        let accounts = provider.request(ProviderRequest::Accounts).await.unwrap();
        assert_eq!(accounts, json!([]));

        let granted = provider.request(ProviderRequest::RequestAccounts).await.unwrap();
        assert_eq!(granted, json!([wallet.address()]));
        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::AccountsChanged(vec![wallet.address()])
        );

        let accounts = provider.request(ProviderRequest::Accounts).await.unwrap();
        assert_eq!(accounts, json!([wallet.address()]));
    }

    #[tokio::test]
    async fn test_denied_connection_is_user_rejection() {
        let (provider, _) = provider(Arc::new(Deny));
        let err = provider.request(ProviderRequest::RequestAccounts).await.unwrap_err();
        assert!(err.is_user_rejection());
        assert!(provider.authorized_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_send_from_unauthorized_account() {
        let (provider, wallet) = provider(Arc::new(AutoApprove));
        let request = TransferRequest::new(wallet.address(), Address::ZERO, U256::from(1u64));
        let err = provider
            .request(ProviderRequest::SendTransaction(request))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_revoke_clears_authorization() {
        let (provider, _) = provider(Arc::new(AutoApprove));
        provider.request(ProviderRequest::RequestAccounts).await.unwrap();
        assert_eq!(provider.authorized_accounts().len(), 1);

        let mut events = provider.events().unwrap();
        provider.revoke().unwrap();
        assert!(provider.authorized_accounts().is_empty());
        assert_eq!(events.recv().await.unwrap(), ProviderEvent::AccountsChanged(vec![]));
    }

    fn reachable(chain_id: u64, accounts: Vec<Address>) -> WalletSnapshot {
        WalletSnapshot {
            chain_id: Some(chain_id),
            accounts,
        }
    }

    #[test]
    fn test_unchanged_snapshot_is_quiet() {
        let snapshot = reachable(1, vec![Address::repeat_byte(1)]);
        assert!(snapshot_changes(&snapshot, &snapshot.clone()).is_empty());
        assert!(snapshot_changes(&WalletSnapshot::unreachable(), &WalletSnapshot::unreachable()).is_empty());
    }

    #[test]
    fn test_network_switch() {
        let account = Address::repeat_byte(1);
        let events = snapshot_changes(&reachable(1, vec![account]), &reachable(5, vec![account]));
        assert_eq!(events, vec![ProviderEvent::ChainChanged(5)]);
    }

    #[test]
    fn test_account_switch() {
        let events = snapshot_changes(
            &reachable(1, vec![Address::repeat_byte(1)]),
            &reachable(1, vec![Address::repeat_byte(2)]),
        );
        assert_eq!(events, vec![ProviderEvent::AccountsChanged(vec![Address::repeat_byte(2)])]);
    }

    #[test]
    fn test_node_lost_and_regained() {
        let account = Address::repeat_byte(1);
        let up = reachable(1, vec![account]);

        let events = snapshot_changes(&up, &WalletSnapshot::unreachable());
        assert_eq!(events, vec![ProviderEvent::Disconnected]);

        let events = snapshot_changes(&WalletSnapshot::unreachable(), &up);
        assert_eq!(
            events,
            vec![
                ProviderEvent::ChainChanged(1),
                ProviderEvent::AccountsChanged(vec![account]),
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_of_unreachable_node() {
        let (provider, _) = provider(Arc::new(AutoApprove));
        assert_eq!(provider.snapshot().await, WalletSnapshot::unreachable());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown() {
        let (provider, _) = provider(Arc::new(AutoApprove));
        let provider = Arc::new(provider);
        let (shutdown, rx) = broadcast::channel(1);

        let monitor = provider.spawn_monitor(Duration::from_millis(50), rx);
        let _ = shutdown.send(());
        tokio::time::timeout(Duration::from_secs(5), monitor)
            .await
            .unwrap()
            .unwrap();
    }
}
