//! Ledger contract interface and its alloy binding.

use alloy::primitives::{Address, TxHash};
use alloy::providers::DynProvider;
use alloy::sol;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::consent::{ensure_authorized, ConsentPrompt, ContractCall};
use crate::blockchain::provider::ProviderRpcError;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use crate::config::LedgerConfig;
use crate::ledger::types::{format_amount, LedgerEntry, RawTransfer};
use crate::storage::LocalStorage;

sol! {
    /// On-chain transfer ledger.
    #[sol(rpc)]
    contract Transactions {
        struct TransferStruct {
            address sender;
            address receiver;
            uint256 amount;
            string message;
            uint256 timestamp;
            string keyword;
        }

        function addToBlockchain(address receiver, uint256 amount, string memory message, string memory keyword) external;
        function getAllTransactions() external view returns (TransferStruct[] memory);
        function getTransactionCount() external view returns (uint256);
    }
}

impl From<Transactions::TransferStruct> for RawTransfer {
    fn from(raw: Transactions::TransferStruct) -> Self {
        Self {
            sender: raw.sender,
            receiver: raw.receiver,
            amount: raw.amount,
            message: raw.message,
            timestamp: raw.timestamp,
            keyword: raw.keyword,
        }
    }
}

/// Operations the coordinator needs from the ledger contract.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Send `addToBlockchain` from `from`; returns the pending transaction hash.
    async fn add_to_blockchain(&self, from: Address, entry: &LedgerEntry) -> BlockchainResult<TxHash>;

    /// Block until `tx_hash` is final (or fails, or times out).
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus>;

    /// Every record, in insertion order.
    async fn get_all_transactions(&self) -> BlockchainResult<Vec<RawTransfer>>;

    /// Number of records.
    async fn get_transaction_count(&self) -> BlockchainResult<u64>;
}

/// [`LedgerContract`] over JSON-RPC.
///
/// Writes obey the same wallet rules as value transfers: the sender must be
/// authorized in `storage` and the user must approve the call.
pub struct AlloyLedger {
    contract: Transactions::TransactionsInstance<DynProvider>,
    tx_builder: TxBuilder,
    config: LedgerConfig,
    storage: LocalStorage,
    consent: Arc<dyn ConsentPrompt>,
}

impl AlloyLedger {
    /// Bind to the contract at `config.contract_address`.
    pub fn new(
        client: BlockchainClient,
        config: LedgerConfig,
        storage: LocalStorage,
        consent: Arc<dyn ConsentPrompt>,
    ) -> BlockchainResult<Self> {
        let address: Address = config.contract_address.parse().map_err(|e| {
            BlockchainError::Contract(format!(
                "Invalid contract address '{}': {}",
                config.contract_address, e
            ))
        })?;

        let contract = Transactions::new(address, client.provider().clone());
        tracing::debug!(contract = %address, "Ledger contract bound");

        Ok(Self {
            contract,
            tx_builder: TxBuilder::new(client),
            config,
            storage,
            consent,
        })
    }

    /// Address of the bound contract.
    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    fn rpc_timeout(&self) -> Duration {
        self.tx_builder.client().timeout_duration()
    }

    fn rpc_timeout_secs(&self) -> u64 {
        self.tx_builder.client().config().rpc_timeout_secs
    }
}

#[async_trait]
impl LedgerContract for AlloyLedger {
    async fn add_to_blockchain(&self, from: Address, entry: &LedgerEntry) -> BlockchainResult<TxHash> {
        ensure_authorized(&self.storage, from)?;

        let request = ContractCall {
            from,
            contract: self.address(),
            function: "addToBlockchain",
            summary: format!(
                "record {} ETH to {} (keyword '{}')",
                format_amount(entry.amount),
                entry.receiver,
                entry.keyword
            ),
        };
        if !self.consent.approve_contract_call(&request) {
            tracing::info!(contract = %request.contract, "Ledger write rejected by user");
            return Err(ProviderRpcError::user_rejected().into());
        }

        let call = self
            .contract
            .addToBlockchain(
                entry.receiver,
                entry.amount,
                entry.message.clone(),
                entry.keyword.clone(),
            )
            .from(from);

        match timeout(self.rpc_timeout(), call.send()).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(BlockchainError::Contract(format!("addToBlockchain failed: {}", e))),
            Err(_) => Err(BlockchainError::Timeout(self.rpc_timeout_secs())),
        }
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus> {
        self.tx_builder
            .wait_for_confirmation(
                tx_hash,
                self.config.confirmation_timeout_secs,
                Duration::from_millis(self.config.poll_interval_ms),
            )
            .await
    }

    async fn get_all_transactions(&self) -> BlockchainResult<Vec<RawTransfer>> {
        let call = self.contract.getAllTransactions();
        match timeout(self.rpc_timeout(), call.call()).await {
            Ok(Ok(records)) => Ok(records.into_iter().map(RawTransfer::from).collect()),
            Ok(Err(e)) => Err(BlockchainError::Contract(format!("getAllTransactions failed: {}", e))),
            Err(_) => Err(BlockchainError::Timeout(self.rpc_timeout_secs())),
        }
    }

    async fn get_transaction_count(&self) -> BlockchainResult<u64> {
        let call = self.contract.getTransactionCount();
        let count = match timeout(self.rpc_timeout(), call.call()).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                return Err(BlockchainError::Contract(format!("getTransactionCount failed: {}", e)))
            }
            Err(_) => return Err(BlockchainError::Timeout(self.rpc_timeout_secs())),
        };

        u64::try_from(count)
            .map_err(|_| BlockchainError::Decode(format!("Transaction count {} overflows u64", count)))
    }
}
