//! Orchestrator control surface.
//!
//! # Data Flow
//! ```text
//! RemediationSweep
//!     → OrchestratorAdapter (trait, this file)
//!         - ecs.rs: `aws ecs` CLI, JSON output
//!         - static_table.rs: fixed table from config
//! ```
//!
//! # Design Decisions
//! - `force_redeploy` is idempotent: an in-flight rollout is acknowledged,
//!   not duplicated
//! - Unknown services fail with `NotFound`, never with a zero count
//! - Adapters hold no sweep state; one adapter can serve concurrent sweeps

pub mod ecs;
pub mod static_table;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::{OrchestratorConfig, OrchestratorKind};

pub use ecs::EcsOrchestrator;
pub use static_table::StaticOrchestrator;

/// Running/desired counts and the current rollout of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service_id: String,
    pub status: String,
    pub running: u32,
    pub desired: u32,
    pub pending: u32,
    /// Identifier of the primary deployment.
    pub deployment_id: Option<String>,
    pub rollout_in_progress: bool,
}

/// The orchestrator accepted a redeploy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeployAck {
    pub service_id: String,
    pub deployment_id: String,
    /// A rollout was already running and has been acknowledged instead.
    pub already_in_progress: bool,
}

/// One entry of a service's recent event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEvent {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Backend settings are missing or unusable.
    #[error("orchestrator misconfigured: {0}")]
    Configuration(String),

    /// The orchestrator has no such service.
    #[error("service '{0}' not found")]
    NotFound(String),

    /// A mutation was refused.
    #[error("request for '{service}' rejected: {reason}")]
    Rejected { service: String, reason: String },

    /// The control command could not run or exited non-zero.
    #[error("orchestrator command failed: {0}")]
    Command(String),

    #[error("orchestrator command timed out after {0} seconds")]
    Timeout(u64),

    /// The control command produced output we could not read.
    #[error("unexpected orchestrator output: {0}")]
    Parse(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Capabilities the sweep needs from a deployment backend.
#[async_trait]
pub trait OrchestratorAdapter: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    async fn describe_service(&self, service_id: &str) -> OrchestratorResult<ServiceStatus>;

    /// Running task count. `NotFound` for unknown services.
    async fn list_running_count(&self, service_id: &str) -> OrchestratorResult<u32> {
        Ok(self.describe_service(service_id).await?.running)
    }

    /// Start a fresh rollout, or acknowledge the one already running.
    async fn force_redeploy(&self, service_id: &str) -> OrchestratorResult<RedeployAck>;

    /// Up to `n` most recent events, newest first.
    async fn tail_recent_events(
        &self,
        service_id: &str,
        n: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>>;
}

/// Build the adapter selected by configuration.
pub fn from_config(config: &OrchestratorConfig) -> OrchestratorResult<Arc<dyn OrchestratorAdapter>> {
    let adapter: Arc<dyn OrchestratorAdapter> = match config.kind {
        OrchestratorKind::Ecs => Arc::new(EcsOrchestrator::from_config(config)?),
        OrchestratorKind::Static => Arc::new(StaticOrchestrator::from_config(config)),
    };

    tracing::debug!(backend = adapter.backend(), "Orchestrator adapter ready");
    Ok(adapter)
}
