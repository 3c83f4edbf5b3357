//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (optional private key)
//!     → wallet.rs (key loading)
//!     → client.rs (RPC connection with timeouts and read failover)
//!     → transaction.rs (build transfers, await confirmations)
//!     → rpc_provider.rs (EIP-1193 provider over the client)
//!
//! provider.rs defines the WalletProvider seam the coordinator depends on.
//! consent.rs holds the approval hook and account authorization shared by
//! the provider and the ledger writer.
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod consent;
pub mod provider;
pub mod rpc_provider;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use provider::{ProviderEvent, ProviderRequest, ProviderRpcError, WalletProvider};
pub use types::{BlockchainConfig, BlockchainError, ChainId};
pub use wallet::Wallet;
