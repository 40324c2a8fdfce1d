//! Sweep subsystem.
//!
//! # Data Flow
//! ```text
//! SweepConfig (by value)
//!     → runner.rs: per target, bounded fan-out
//!         probe/ → health/ → remediation/ → orchestrator/ → re-probe
//!     → report.rs: SweepReport in input order, exit status
//! ```

pub mod report;
pub mod runner;

pub use report::{
    ActionOutcome, ExitStatus, Observation, SweepEntry, SweepReport, TargetFailure,
};
pub use runner::{RemediationSweep, SweepError};
