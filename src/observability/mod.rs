//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handshake, hand-off and bridge lifecycle produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, plain or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Expected rejections log below warn so misdirected clients cannot flood logs
//! - Metrics are cheap (atomic increments) and recorded whether or not an
//!   exporter is installed

pub mod logging;
pub mod metrics;
