//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware and handlers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms in a MetricsSet)
//!
//! Consumers:
//!     → stdout or log file (optionally rotated)
//!     → metrics listener (Prometheus scrape of /metrics)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::MetricsSet;
