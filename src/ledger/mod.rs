//! Ledger contract subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator
//!     → contract.rs (LedgerContract trait; AlloyLedger over sol! bindings)
//!     → types.rs (RawTransfer → TransactionRecord, wei ↔ ether)
//! ```

pub mod contract;
pub mod types;

pub use contract::{AlloyLedger, LedgerContract, Transactions};
pub use types::{LedgerEntry, RawTransfer, TransactionRecord};
