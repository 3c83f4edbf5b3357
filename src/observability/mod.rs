//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator, provider, ledger
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stderr (fmt layer)
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
