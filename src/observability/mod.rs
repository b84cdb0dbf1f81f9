//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup stages, RPC handlers, job service:
//!     → logging.rs (structured log events on stdout)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Debug listener: GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Log level comes from `RUST_LOG` only; it is not part of the service
//!   configuration table
//! - Metrics are cheap (atomic increments) and become no-ops when no recorder
//!   is installed, which is the case in unit tests

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
