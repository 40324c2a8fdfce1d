//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe of a target:
//!     → retries.rs (retry transport failures, bounded attempts)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries live with the caller, never inside a probe
//! - The settle-and-reprobe after remediation is a single attempt

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
