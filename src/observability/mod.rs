//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Compiler and dispatcher produce:
//!     → logging.rs (structured log events, request ID on every line)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
