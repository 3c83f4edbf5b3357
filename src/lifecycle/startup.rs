//! Startup orchestration.
//!
//! Builds the coordinator and its collaborators from a validated config.
//! Subsystems initialize in dependency order; any error is fatal.

use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::consent::ConsentPrompt;
use crate::blockchain::provider::WalletProvider;
use crate::blockchain::rpc_provider::RpcWalletProvider;
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wallet::Wallet;
use crate::config::AppConfig;
use crate::coordinator::WalletTransactionCoordinator;
use crate::ledger::contract::AlloyLedger;
use crate::storage::{LocalStorage, StorageError};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("blockchain: {0}")]
    Blockchain(#[from] BlockchainError),
}

/// Everything `build_coordinator` wires together.
pub struct AppContext {
    /// Coordinator with the provider attached but no session; call
    /// `load_on_startup` to restore one.
    pub coordinator: Arc<WalletTransactionCoordinator>,
    /// The same provider the coordinator holds, for starting its monitor.
    pub provider: Arc<RpcWalletProvider>,
}

/// Wire storage, RPC client, wallet provider and ledger into a coordinator.
pub async fn build_coordinator(
    config: &AppConfig,
    consent: Arc<dyn ConsentPrompt>,
) -> Result<AppContext, StartupError> {
    // 1. Durable storage
    let storage = LocalStorage::open(&config.storage.path)?;

    // 2. Optional local signing key
    let wallet = Wallet::from_env(&config.wallet.private_key_env, config.blockchain.chain_id)?;

    // 3. RPC client
    let client = BlockchainClient::new(config.blockchain.clone(), wallet.as_ref()).await?;
    if !client.is_healthy().await {
        tracing::warn!(rpc_url = %config.blockchain.rpc_url, "RPC node unreachable; reads will fail until it recovers");
    }

    // 4. Collaborators
    let provider = Arc::new(RpcWalletProvider::new(
        client.clone(),
        storage.clone(),
        Arc::clone(&consent),
    ));
    let ledger = AlloyLedger::new(client, config.ledger.clone(), storage.clone(), consent)?;
    tracing::info!(contract = %ledger.address(), "Ledger ready");

    let wallet_provider: Arc<dyn WalletProvider> = provider.clone();
    let coordinator = Arc::new(WalletTransactionCoordinator::new(
        Some(wallet_provider),
        Arc::new(ledger),
        storage,
    ));

    Ok(AppContext {
        coordinator,
        provider,
    })
}
