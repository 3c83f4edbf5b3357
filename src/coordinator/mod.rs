//! Wallet/transaction coordination.
//!
//! # Data Flow
//! ```text
//! UI input ──▶ update_form_field ──▶ TransferForm
//! UI action ─▶ connect / submit_transfer / refresh_*
//!                 │                      │
//!                 ▼                      ▼
//!          WalletProvider          LedgerContract
//!                 │                      │
//!                 └──────▶ CoordinatorState (watch channel) ──▶ UI
//! ```
//!
//! Provider events (account or chain switches) feed back into the same
//! state through `handle_provider_event`.

pub mod engine;
pub mod error;
pub mod form;
pub mod state;

pub use engine::{WalletTransactionCoordinator, TRANSACTION_COUNT_KEY};
pub use error::{CoordinatorError, CoordinatorResult};
pub use form::{FormField, TransferForm, ValidatedTransfer};
pub use state::{CoordinatorState, TransferReceipt};
