//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, auth cascade, config loader produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through spans and response headers
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
