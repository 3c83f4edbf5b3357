//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + read failovers)
//! - Query chain state (block number, accounts, receipts, gas price)
//! - Broadcast transactions through the primary endpoint
//! - Handle timeouts and network errors gracefully

use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportResult;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Address of the local signer, if one is installed.
    signer: Option<Address>,
    /// Configuration.
    config: BlockchainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// # Arguments
    /// * `config` - Blockchain configuration
    /// * `wallet` - Optional local signer; without one, transactions are
    ///   signed by the node's unlocked accounts
    ///
    /// # Returns
    /// A new client, or an error if the primary URL is invalid. An
    /// unreachable node is logged but does not fail construction.
    pub async fn new(config: BlockchainConfig, wallet: Option<&Wallet>) -> BlockchainResult<Self> {
        let client = Self::build(config, wallet)?;

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %client.config.rpc_url,
                    chain_id = client.config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Build the client without touching the network.
    pub fn build(config: BlockchainConfig, wallet: Option<&Wallet>) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        // 1. Add primary provider
        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Self::connect(primary_url, wallet));

        // 2. Add failover providers
        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Self::connect(url, wallet));
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        Ok(Self {
            providers,
            signer: wallet.map(Wallet::address),
            config,
            timeout_duration,
        })
    }

    fn connect(url: url::Url, wallet: Option<&Wallet>) -> DynProvider {
        match wallet {
            Some(wallet) => ProviderBuilder::new()
                .wallet(wallet.network_wallet())
                .connect_http(url)
                .erased(),
            None => ProviderBuilder::new().connect_http(url).erased(),
        }
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Run a read against each endpoint in turn until one answers.
    async fn read<T, F, Fut>(&self, method: &'static str, call: F) -> BlockchainResult<T>
    where
        F: Fn(&DynProvider) -> Fut,
        Fut: IntoFuture<Output = TransportResult<T>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider"),
            }
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed: {}", method)))
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.read("eth_chainId", |p| p.get_chain_id()).await.map(ChainId)
    }

    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.read("eth_blockNumber", |p| p.get_block_number()).await
    }

    /// Accounts this client can sign for.
    ///
    /// With a local signer that is the signer's address; otherwise the
    /// node's unlocked accounts (`eth_accounts`).
    pub async fn get_accounts(&self) -> BlockchainResult<Vec<Address>> {
        if let Some(address) = self.signer {
            return Ok(vec![address]);
        }
        self.read("eth_accounts", |p| p.get_accounts()).await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.read("eth_getTransactionReceipt", |p| p.get_transaction_receipt(tx_hash))
            .await
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.read("eth_gasPrice", |p| p.get_gas_price()).await
    }

    /// Broadcast a transaction through the primary endpoint.
    ///
    /// Writes never fail over: a retry on another node could double-spend.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        let fut = self.providers[0].send_transaction(tx);
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(BlockchainError::Rpc(format!("eth_sendTransaction failed: {}", e))),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    /// Check if the blockchain is reachable and healthy.
    ///
    /// Returns true if we can query the block number.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    /// Get the underlying primary provider.
    pub fn provider(&self) -> &DynProvider {
        &self.providers[0]
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Per-request timeout.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Get the number of confirmation blocks required.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .field("local_signer", &self.signer.is_some())
            .finish()
    }
}
