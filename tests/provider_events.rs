mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use common::{account, coordinator, recipient, MockLedger, MockProvider};
use transfer_ledger::blockchain::provider::ProviderEvent;
use transfer_ledger::blockchain::WalletProvider;
use transfer_ledger::coordinator::CoordinatorError;
use transfer_ledger::ledger::RawTransfer;
use transfer_ledger::lifecycle::Shutdown;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_empty_accounts_clear_session() {
    let provider = Arc::new(MockProvider::new(vec![account()]));
    let coordinator = coordinator(Some(provider), Arc::new(MockLedger::new()));
    coordinator.connect().await.unwrap();

    coordinator.handle_provider_event(ProviderEvent::AccountsChanged(vec![]));
    assert_eq!(coordinator.current_account(), None);

    coordinator.handle_provider_event(ProviderEvent::AccountsChanged(vec![recipient(), account()]));
    assert_eq!(coordinator.current_account(), Some(recipient()));
}

#[tokio::test]
async fn test_disconnect_clears_session() {
    let provider = Arc::new(MockProvider::new(vec![account()]));
    let coordinator = coordinator(Some(provider), Arc::new(MockLedger::new()));
    coordinator.connect().await.unwrap();

    coordinator.handle_provider_event(ProviderEvent::Disconnected);
    assert!(!coordinator.state().is_connected());
}

#[tokio::test]
async fn test_chain_change_drops_history() {
    let record = RawTransfer {
        sender: account(),
        receiver: recipient(),
        amount: alloy::primitives::U256::from(1u64),
        message: String::new(),
        timestamp: alloy::primitives::U256::from(1_700_000_000u64),
        keyword: String::new(),
    };
    let coordinator = coordinator(None, Arc::new(MockLedger::with_records(vec![record])));
    coordinator.refresh_transaction_history().await.unwrap();
    assert_eq!(coordinator.transactions().len(), 1);

    coordinator.handle_provider_event(ProviderEvent::ChainChanged(11155111));

    let state = coordinator.state();
    assert_eq!(state.chain_id, Some(11155111));
    assert!(state.transactions.is_empty());
}

#[tokio::test]
async fn test_attach_provider_later() {
    let coordinator = coordinator(None, Arc::new(MockLedger::new()));
    assert!(!coordinator.has_provider());
    assert!(matches!(
        coordinator.connect().await,
        Err(CoordinatorError::ProviderUnavailable)
    ));

    let provider: Arc<dyn WalletProvider> = Arc::new(MockProvider::new(vec![account()]));
    coordinator.attach_provider(provider);
    assert!(coordinator.has_provider());
    assert_eq!(coordinator.connect().await.unwrap(), account());

    coordinator.detach_provider();
    assert!(!coordinator.has_provider());
    assert_eq!(coordinator.current_account(), Some(account()));
}

#[tokio::test]
async fn test_watcher_requires_provider() {
    let coordinator = coordinator(None, Arc::new(MockLedger::new()));
    let shutdown = Shutdown::new();
    assert!(coordinator.watch_provider_events(shutdown.subscribe()).is_none());
}

#[tokio::test]
async fn test_watcher_follows_events_until_shutdown() {
    let provider = Arc::new(MockProvider::new(vec![account(), recipient()]));
    let coordinator = coordinator(Some(provider.clone()), Arc::new(MockLedger::new()));
    coordinator.connect().await.unwrap();

    let shutdown = Shutdown::new();
    let watcher = coordinator
        .watch_provider_events(shutdown.subscribe())
        .unwrap();
    let mut updates = coordinator.subscribe();

    provider.emit(ProviderEvent::AccountsChanged(vec![recipient()]));
    timeout(WAIT, updates.wait_for(|s| s.current_account == Some(recipient())))
        .await
        .unwrap()
        .unwrap();

    provider.emit(ProviderEvent::ChainChanged(1));
    timeout(WAIT, updates.wait_for(|s| s.chain_id == Some(1)))
        .await
        .unwrap()
        .unwrap();

    provider.emit(ProviderEvent::AccountsChanged(vec![]));
    timeout(WAIT, updates.wait_for(|s| s.current_account.is_none()))
        .await
        .unwrap()
        .unwrap();

    shutdown.trigger();
    timeout(WAIT, watcher).await.unwrap().unwrap();
}
