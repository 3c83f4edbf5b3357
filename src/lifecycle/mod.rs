//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Storage → Wallet key → RPC client → Provider + Ledger → Coordinator
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → background watchers exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_coordinator, AppContext, StartupError};
