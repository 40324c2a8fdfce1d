//! Remediation subsystem.
//!
//! # Data Flow
//! ```text
//! HealthState (+ running count)
//!     → policy.rs (choose one action)
//!     → ForceRedeploy: orchestrator/
//!     → RebuildAndPush: publisher.rs, then optional ForceRedeploy
//! ```
//!
//! # Design Decisions
//! - One action per target per sweep
//! - Actions are fire-and-forget up to acknowledgment
//! - Report-only by default

pub mod policy;
pub mod publisher;

pub use policy::{choose_action, RemediationAction};
pub use publisher::{ArtifactPublisher, CommandPublisher, PublishError};
