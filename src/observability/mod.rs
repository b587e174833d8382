//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / http / repository produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty, compact or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace span
//! - Metrics are cheap (atomic increments) and safe without a recorder

pub mod logging;
pub mod metrics;
