//! Deployment health sweep library.
//!
//! Probes web services behind a shared reverse proxy, classifies what each
//! one serves, and optionally drives redeploys or rebuilds through the
//! orchestrator.

pub mod config;
pub mod health;
pub mod observability;
pub mod orchestrator;
pub mod probe;
pub mod remediation;
pub mod resilience;
pub mod sweep;

pub use config::schema::SweepConfig;
pub use config::ServiceTarget;
pub use health::{HealthClassifier, HealthState};
pub use probe::ProbeClient;
pub use remediation::RemediationAction;
pub use sweep::{RemediationSweep, SweepReport};
