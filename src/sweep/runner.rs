//! The remediation sweep.
//!
//! # Per-target state machine
//! ```text
//! Probing → Classified → Done
//!                  └───→ Remediating → (settle) → re-probe → Done
//! ```
//!
//! # Design Decisions
//! - Each target is its own task; a failing target never blocks another
//! - At most `sweep.max_concurrency` targets probing or acting; a target
//!   waiting out its settle interval does not hold a slot
//! - Before any action the orchestrator must know the service; an unknown
//!   service is a target failure and nothing is attempted
//! - Report order is input order, not completion order
//! - One re-probe after the settle interval, no convergence loop

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{validate_config, ServiceTarget, SweepConfig};
use crate::health::{HealthClassifier, HealthState};
use crate::observability::metrics;
use crate::orchestrator::{OrchestratorAdapter, OrchestratorError};
use crate::probe::ProbeClient;
use crate::remediation::{choose_action, ArtifactPublisher, RemediationAction};
use crate::resilience::RetryPolicy;
use crate::sweep::report::{ActionOutcome, Observation, SweepEntry, SweepReport, TargetFailure};

#[derive(Debug, Error)]
pub enum SweepError {
    /// Bad configuration or unreachable proxy; nothing was probed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A target's task died before producing its entry.
    #[error("probe of target '{target}' could not be completed: {reason}")]
    TargetIncomplete { target: String, reason: String },
}

#[derive(Clone)]
struct SweepContext {
    config: SweepConfig,
    probe: ProbeClient,
    classifier: HealthClassifier,
    retry: RetryPolicy,
    orchestrator: Option<Arc<dyn OrchestratorAdapter>>,
    publisher: Option<Arc<dyn ArtifactPublisher>>,
}

/// Probe, classify and optionally remediate every configured target.
///
/// All inputs are owned by the sweep; several sweeps can run side by side.
pub struct RemediationSweep {
    ctx: Arc<SweepContext>,
}

impl RemediationSweep {
    /// Validate `config` and prepare a sweep. Without an orchestrator, running
    /// counts are never looked up and nothing is redeployed.
    pub fn new(config: SweepConfig) -> Result<Self, SweepError> {
        validate_config(&config).map_err(|errors| {
            SweepError::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let probe = ProbeClient::new(&config.proxy.base_url, config.probe.clone())
            .map_err(|e| SweepError::Configuration(e.to_string()))?;

        Ok(Self {
            ctx: Arc::new(SweepContext {
                classifier: HealthClassifier::from_config(&config.probe),
                retry: RetryPolicy::new(&config.retries),
                probe,
                config,
                orchestrator: None,
                publisher: None,
            }),
        })
    }

    pub fn with_orchestrator(self, orchestrator: Arc<dyn OrchestratorAdapter>) -> Self {
        self.map_ctx(|ctx| ctx.orchestrator = Some(orchestrator))
    }

    pub fn with_publisher(self, publisher: Arc<dyn ArtifactPublisher>) -> Self {
        self.map_ctx(|ctx| ctx.publisher = Some(publisher))
    }

    fn map_ctx(self, f: impl FnOnce(&mut SweepContext)) -> Self {
        let mut ctx = Arc::try_unwrap(self.ctx).unwrap_or_else(|shared| (*shared).clone());
        f(&mut ctx);
        Self { ctx: Arc::new(ctx) }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.ctx.config
    }

    /// Run the sweep to completion.
    pub async fn run(&self) -> Result<SweepReport, SweepError> {
        let sweep_id = Uuid::new_v4();
        let span = tracing::info_span!("sweep", %sweep_id);
        self.run_inner(sweep_id).instrument(span).await
    }

    async fn run_inner(&self, sweep_id: Uuid) -> Result<SweepReport, SweepError> {
        let started_at = Utc::now();
        let config = &self.ctx.config;
        let targets: Vec<ServiceTarget> = config.targets.iter().map(ServiceTarget::from).collect();

        tracing::info!(
            proxy = %config.proxy.base_url,
            targets = targets.len(),
            remediation = config.remediation.enabled,
            "Sweep starting"
        );

        if config.proxy.preflight {
            let status = self.ctx.probe.preflight().await.map_err(|e| {
                SweepError::Configuration(format!(
                    "proxy base {} unreachable: {}",
                    config.proxy.base_url, e
                ))
            })?;
            tracing::debug!(status, "Proxy preflight answered");
        }

        let limit = Arc::new(Semaphore::new(config.sweep.max_concurrency));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let ctx = self.ctx.clone();
            let limit = limit.clone();
            let name = target.name().to_string();
            let span = tracing::info_span!("target", service = %name);

            let handle = tokio::spawn(ctx.sweep_target(target, limit).instrument(span));
            handles.push((name, handle));
        }

        let mut entries = Vec::with_capacity(handles.len());
        let mut incomplete = None;
        for (name, handle) in handles {
            match handle.await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Target task failed");
                    if incomplete.is_none() {
                        incomplete = Some(SweepError::TargetIncomplete {
                            target: name,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        if let Some(err) = incomplete {
            return Err(err);
        }

        let report = SweepReport {
            sweep_id,
            proxy_base: config.proxy.base_url.clone(),
            remediation_enabled: config.remediation.enabled,
            started_at,
            finished_at: Utc::now(),
            entries,
        };

        tracing::info!(
            exit_code = report.exit_status().code(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Sweep finished"
        );
        Ok(report)
    }
}

impl SweepContext {
    async fn observe(&self, target: &ServiceTarget, policy: &RetryPolicy) -> Observation {
        let (outcome, attempts) = policy.run(|| self.probe.probe(target)).await;
        let state = self.classifier.classify(&outcome);

        metrics::record_probe(target.name(), &outcome);
        metrics::record_health(target.name(), state);

        match &outcome {
            Ok(result) => tracing::info!(status = result.status, %state, attempts, "Classified"),
            Err(e) => tracing::warn!(error = %e, %state, attempts, "Probe failed"),
        }

        Observation {
            state,
            attempts,
            outcome,
        }
    }

    /// The permit from `limit` is held while probing and acting, and given
    /// back for the settle interval.
    async fn sweep_target(
        self: Arc<Self>,
        target: ServiceTarget,
        limit: Arc<Semaphore>,
    ) -> SweepEntry {
        let permit = limit.clone().acquire_owned().await.ok();

        let before = self.observe(&target, &self.retry).await;
        let state = before.state;
        let mut entry = SweepEntry::new(target, before);

        if needs_orchestrator(state) {
            match self.running_count(&entry.target).await {
                Ok(running) => entry.running_count = running,
                Err(failure) => {
                    tracing::warn!(failure = %failure, "Cannot decide remediation");
                    entry.action_outcome = ActionOutcome::Skipped {
                        reason: failure.to_string(),
                    };
                    entry.failure = Some(failure);
                    return entry;
                }
            }
        }

        let action = choose_action(state, entry.running_count);
        entry.action = action;
        if action.is_none() {
            return entry;
        }

        if !self.config.remediation.enabled {
            tracing::info!(%action, "Remediation disabled, reporting only");
            entry.action_outcome = ActionOutcome::DryRun;
            metrics::record_remediation(entry.target.name(), action, "dry_run");
            return entry;
        }

        let (outcome, failure) = match self.remediate(&entry.target, action).await {
            Ok(outcome) => (outcome, None),
            Err((outcome, failure)) => (outcome, Some(failure)),
        };
        entry.action_outcome = outcome;
        entry.failure = failure;
        metrics::record_remediation(entry.target.name(), action, entry.action_outcome.label());

        if entry.action_outcome.is_acknowledged() {
            let settle = Duration::from_secs(self.config.remediation.settle_secs);
            tracing::info!(%action, settle_secs = settle.as_secs(), "Action acknowledged, settling");
            drop(permit);
            tokio::time::sleep(settle).await;

            let _permit = limit.acquire_owned().await.ok();
            entry.after = Some(self.observe(&entry.target, &RetryPolicy::once()).await);
        }

        entry
    }

    /// `Ok(None)` when no orchestrator is attached.
    async fn running_count(&self, target: &ServiceTarget) -> Result<Option<u32>, TargetFailure> {
        let Some(orchestrator) = &self.orchestrator else {
            return Ok(None);
        };

        match orchestrator.list_running_count(target.service_id()).await {
            Ok(n) => Ok(Some(n)),
            Err(OrchestratorError::NotFound(service_id)) => {
                Err(TargetFailure::OrchestratorNotFound { service_id })
            }
            Err(e) => Err(TargetFailure::Orchestrator {
                reason: e.to_string(),
            }),
        }
    }

    async fn remediate(&self, target: &ServiceTarget, action: RemediationAction) -> Remediated {
        let service_id = target.service_id();

        match action {
            RemediationAction::None => Ok(ActionOutcome::NotNeeded),
            RemediationAction::ForceRedeploy => self.redeploy(service_id, None).await,
            RemediationAction::RebuildAndPush => {
                let Some(publisher) = &self.publisher else {
                    return Ok(ActionOutcome::Skipped {
                        reason: "no build command configured".to_string(),
                    });
                };

                let artifact = match publisher.rebuild_and_push(service_id).await {
                    Ok(artifact) => artifact,
                    Err(e) => {
                        tracing::error!(error = %e, "Rebuild and push failed");
                        return Ok(ActionOutcome::Failed {
                            reason: e.to_string(),
                        });
                    }
                };

                if self.config.remediation.redeploy_after_publish {
                    self.redeploy(service_id, Some(&artifact)).await
                } else {
                    Ok(ActionOutcome::Acknowledged {
                        detail: format!("published {}", artifact),
                    })
                }
            }
        }
    }

    async fn redeploy(&self, service_id: &str, artifact: Option<&str>) -> Remediated {
        let published = artifact
            .map(|a| format!("published {}, ", a))
            .unwrap_or_default();

        let Some(orchestrator) = &self.orchestrator else {
            return Ok(ActionOutcome::Skipped {
                reason: format!("{}no orchestrator configured", published),
            });
        };

        match orchestrator.force_redeploy(service_id).await {
            Ok(ack) => {
                tracing::info!(
                    deployment = %ack.deployment_id,
                    already_in_progress = ack.already_in_progress,
                    "Redeploy acknowledged"
                );
                let suffix = if ack.already_in_progress {
                    " (already in progress)"
                } else {
                    ""
                };
                Ok(ActionOutcome::Acknowledged {
                    detail: format!("{}deployment {}{}", published, ack.deployment_id, suffix),
                })
            }
            Err(OrchestratorError::NotFound(service_id)) => {
                let failure = TargetFailure::OrchestratorNotFound { service_id };
                tracing::error!(failure = %failure, "Redeploy target vanished");
                let outcome = ActionOutcome::Failed {
                    reason: format!("{}{}", published, failure),
                };
                Err((outcome, failure))
            }
            Err(e) => {
                tracing::error!(error = %e, "Redeploy rejected");
                Ok(ActionOutcome::Failed {
                    reason: format!("{}{}", published, e),
                })
            }
        }
    }
}

/// Outcome of an attempted action; `Err` also carries a target-level failure.
type Remediated = Result<ActionOutcome, (ActionOutcome, TargetFailure)>;

/// States whose action depends on the orchestrator knowing the service.
fn needs_orchestrator(state: HealthState) -> bool {
    matches!(state, HealthState::Unreachable | HealthState::AssetFailure)
}
