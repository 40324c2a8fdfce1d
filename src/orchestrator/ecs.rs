//! AWS ECS adapter driving the `aws` CLI.
//!
//! # Responsibilities
//! - `aws ecs describe-services` for counts, deployments and events
//! - `aws ecs update-service --force-new-deployment` for redeploys
//! - Map CLI failures onto `OrchestratorError`
//!
//! # Design Decisions
//! - Shelling out keeps credentials, profiles and SSO in the CLI's hands
//! - Every invocation has a deadline and is killed when it expires
//! - Redeploys are serialized in-process so a describe-then-update pair
//!   cannot interleave with another one

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::OrchestratorConfig;
use crate::orchestrator::{
    OrchestratorAdapter, OrchestratorError, OrchestratorResult, RedeployAck, ServiceEvent,
    ServiceStatus,
};

pub struct EcsOrchestrator {
    cluster: String,
    region: Option<String>,
    profile: Option<String>,
    aws_cli: String,
    timeout_duration: Duration,
    redeploy_lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeServicesOutput {
    #[serde(default)]
    services: Vec<EcsService>,
    #[serde(default)]
    failures: Vec<EcsFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateServiceOutput {
    service: EcsService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsService {
    #[serde(default)]
    status: String,
    #[serde(default)]
    running_count: u32,
    #[serde(default)]
    desired_count: u32,
    #[serde(default)]
    pending_count: u32,
    #[serde(default)]
    deployments: Vec<EcsDeployment>,
    #[serde(default)]
    events: Vec<EcsEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsDeployment {
    id: String,
    status: String,
    #[serde(default)]
    rollout_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created_at: Option<serde_json::Value>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct EcsFailure {
    #[serde(default)]
    reason: Option<String>,
}

impl EcsService {
    fn primary(&self) -> Option<&EcsDeployment> {
        self.deployments.iter().find(|d| d.status == "PRIMARY")
    }

    /// More than one deployment, or a primary still rolling out.
    fn rollout_in_progress(&self) -> bool {
        self.deployments.len() > 1
            || self
                .primary()
                .and_then(|d| d.rollout_state.as_deref())
                .map(|s| s == "IN_PROGRESS")
                .unwrap_or(false)
    }

    fn to_status(&self, service_id: &str) -> ServiceStatus {
        ServiceStatus {
            service_id: service_id.to_string(),
            status: self.status.clone(),
            running: self.running_count,
            desired: self.desired_count,
            pending: self.pending_count,
            deployment_id: self.primary().map(|d| d.id.clone()),
            rollout_in_progress: self.rollout_in_progress(),
        }
    }
}

impl EcsEvent {
    fn to_event(&self) -> ServiceEvent {
        ServiceEvent {
            id: self.id.clone(),
            created_at: self.created_at.as_ref().and_then(parse_timestamp),
            message: self.message.clone(),
        }
    }
}

/// The CLI prints ISO-8601 by default and epoch seconds with
/// `cli_timestamp_format = none`.
fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => {
            let secs = n.as_f64()?;
            let nanos = ((secs.fract()) * 1e9) as u32;
            DateTime::from_timestamp(secs.trunc() as i64, nanos)
        }
        _ => None,
    }
}

/// Pick the single service out of a describe-services response.
fn parse_describe(service_id: &str, stdout: &[u8]) -> OrchestratorResult<EcsService> {
    let output: DescribeServicesOutput =
        serde_json::from_slice(stdout).map_err(|e| OrchestratorError::Parse(e.to_string()))?;

    if output
        .failures
        .iter()
        .any(|f| f.reason.as_deref() == Some("MISSING"))
    {
        return Err(OrchestratorError::NotFound(service_id.to_string()));
    }

    match output.services.into_iter().next() {
        Some(service) if service.status != "INACTIVE" => Ok(service),
        _ => Err(OrchestratorError::NotFound(service_id.to_string())),
    }
}

fn parse_update(stdout: &[u8]) -> OrchestratorResult<EcsService> {
    let output: UpdateServiceOutput =
        serde_json::from_slice(stdout).map_err(|e| OrchestratorError::Parse(e.to_string()))?;
    Ok(output.service)
}

impl EcsOrchestrator {
    pub fn from_config(config: &OrchestratorConfig) -> OrchestratorResult<Self> {
        let cluster = config
            .cluster
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                OrchestratorError::Configuration("ecs backend needs orchestrator.cluster".to_string())
            })?;

        Ok(Self {
            cluster,
            region: config.region.clone(),
            profile: config.profile.clone(),
            aws_cli: config.aws_cli.clone(),
            timeout_duration: Duration::from_secs(config.command_timeout_secs),
            redeploy_lock: Mutex::new(()),
        })
    }

    /// Run `aws ecs <subcommand> ...` and return stdout.
    async fn aws(&self, service_id: &str, args: &[&str]) -> OrchestratorResult<Vec<u8>> {
        let mut cmd = Command::new(&self.aws_cli);
        cmd.arg("ecs")
            .args(args)
            .arg("--cluster")
            .arg(&self.cluster)
            .args(["--output", "json"])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }

        tracing::debug!(service = %service_id, ?args, "Invoking aws ecs");

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(OrchestratorError::Command(format!(
                    "failed to run {}: {}",
                    self.aws_cli, e
                )))
            }
            Err(_) => return Err(OrchestratorError::Timeout(self.timeout_duration.as_secs())),
        };

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("ServiceNotFoundException") || stderr.contains("ServiceNotActiveException")
        {
            return Err(OrchestratorError::NotFound(service_id.to_string()));
        }
        Err(OrchestratorError::Command(stderr))
    }

    async fn describe(&self, service_id: &str) -> OrchestratorResult<EcsService> {
        let stdout = self
            .aws(service_id, &["describe-services", "--services", service_id])
            .await?;
        parse_describe(service_id, &stdout)
    }
}

#[async_trait]
impl OrchestratorAdapter for EcsOrchestrator {
    fn backend(&self) -> &'static str {
        "ecs"
    }

    async fn describe_service(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        Ok(self.describe(service_id).await?.to_status(service_id))
    }

    async fn force_redeploy(&self, service_id: &str) -> OrchestratorResult<RedeployAck> {
        let _guard = self.redeploy_lock.lock().await;

        let current = self.describe(service_id).await?;
        if current.rollout_in_progress() {
            if let Some(primary) = current.primary() {
                tracing::info!(
                    service = %service_id,
                    deployment = %primary.id,
                    "Rollout already in progress, acknowledging it"
                );
                return Ok(RedeployAck {
                    service_id: service_id.to_string(),
                    deployment_id: primary.id.clone(),
                    already_in_progress: true,
                });
            }
        }

        let stdout = self
            .aws(
                service_id,
                &["update-service", "--service", service_id, "--force-new-deployment"],
            )
            .await
            .map_err(|e| match e {
                OrchestratorError::Command(reason) => OrchestratorError::Rejected {
                    service: service_id.to_string(),
                    reason,
                },
                other => other,
            })?;

        let updated = parse_update(&stdout)?;
        let deployment_id = updated
            .primary()
            .map(|d| d.id.clone())
            .ok_or_else(|| OrchestratorError::Parse("no PRIMARY deployment in response".into()))?;

        Ok(RedeployAck {
            service_id: service_id.to_string(),
            deployment_id,
            already_in_progress: false,
        })
    }

    async fn tail_recent_events(
        &self,
        service_id: &str,
        n: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>> {
        let service = self.describe(service_id).await?;
        Ok(service.events.iter().take(n).map(EcsEvent::to_event).collect())
    }
}
