//! Health classification subsystem.
//!
//! # Data Flow
//! ```text
//! ProbeOutcome (probe/)
//!     → classifier.rs (ordered rules, first match wins)
//!     → HealthState (state.rs)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of the outcome and thresholds
//! - States are derived per probe, never stored on their own
//! - Transport failures are always Unreachable

pub mod classifier;
pub mod state;

pub use classifier::HealthClassifier;
pub use state::HealthState;
