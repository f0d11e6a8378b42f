//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (compact or pretty)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Log level configurable via config and overridable with `RUST_LOG`
//! - Metrics are recorded through the `metrics` facade; with no exporter
//!   installed every update is a no-op
//! - Request IDs are carried as span/event fields, not generated here

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
