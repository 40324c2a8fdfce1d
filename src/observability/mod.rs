//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! probe/, sweep/ produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr, JSON)
//!     → Prometheus textfile collector (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (service, state, action) on every event
//! - Each sweep runs inside a span carrying its sweep_id
//! - Metrics are cheap and no-ops without a recorder

pub mod logging;
pub mod metrics;
