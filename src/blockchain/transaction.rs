//! Transaction building and confirmation monitoring.
//!
//! # Responsibilities
//! - Turn a wallet transfer request into a node transaction with a capped gas price
//! - Monitor confirmations for a broadcast transaction

use alloy::network::TransactionBuilder;
use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionRequest;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::provider::TransferRequest;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};

/// Transaction builder for common operations.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    client: BlockchainClient,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(client: BlockchainClient) -> Self {
        Self { client }
    }

    /// Build a node transaction for a wallet transfer request.
    ///
    /// Gas limit and value come from the request; the gas price is read from
    /// the chain, checked against the configured ceiling and padded by the
    /// configured multiplier. Nonce and chain id are left to the provider.
    pub async fn build_transfer(&self, request: &TransferRequest) -> BlockchainResult<TransactionRequest> {
        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        // Check against max gas price
        let config = self.client.config();
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }

        // Apply multiplier for safety margin
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let tx = TransactionRequest::default()
            .with_from(request.from)
            .with_to(request.to)
            .with_value(request.value)
            .with_gas_limit(request.gas.to::<u64>())
            .with_gas_price(adjusted_gas_price);

        Ok(tx)
    }

    /// Wait for a transaction to be confirmed.
    ///
    /// # Arguments
    /// * `tx_hash` - Transaction hash to monitor
    /// * `timeout_secs` - Maximum time to wait for confirmation
    /// * `poll_interval` - Delay between receipt queries
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout_secs: u64,
        poll_interval: Duration,
    ) -> BlockchainResult<ConfirmationStatus> {
        let required_confirmations = self.client.confirmation_blocks();
        let timeout_duration = Duration::from_secs(timeout_secs);

        let result = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.client.get_transaction_receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
                }

                // A receipt counts as the first confirmation.
                let current_block = self.client.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) as u32 + 1;

                if confirmations >= required_confirmations {
                    return Ok(ConfirmationStatus::Confirmed {
                        block_number: tx_block,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(timeout_secs)),
        }
    }

    /// The client transactions are built against.
    pub fn client(&self) -> &BlockchainClient {
        &self.client
    }
}
