//! Wallet-connected transfer ledger client.
//!
//! A [`WalletTransactionCoordinator`] holds the wallet session, the transfer
//! form and the ledger history. It talks to an injected
//! [`WalletProvider`](blockchain::provider::WalletProvider) and a
//! [`LedgerContract`](ledger::LedgerContract), and publishes its state
//! through a watch channel.

pub mod blockchain;
pub mod config;
pub mod coordinator;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod storage;

pub use config::AppConfig;
pub use coordinator::{CoordinatorError, WalletTransactionCoordinator};
