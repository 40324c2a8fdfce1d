//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a sweep.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a health sweep.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SweepConfig {
    /// Shared reverse proxy in front of every service.
    pub proxy: ProxyConfig,

    /// Probe behaviour and classifier thresholds.
    pub probe: ProbeConfig,

    /// Caller-side retry of transport failures.
    pub retries: RetryConfig,

    /// Sweep fan-out.
    pub sweep: ConcurrencyConfig,

    /// Automatic remediation settings.
    pub remediation: RemediationConfig,

    /// Orchestrator backend.
    pub orchestrator: OrchestratorConfig,

    /// External build/push collaborator.
    pub build: Option<BuildConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Services to sweep, in report order.
    pub targets: Vec<TargetConfig>,
}

/// Shared proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the proxy (e.g., "http://my-alb.elb.amazonaws.com").
    pub base_url: String,

    /// Check the proxy answers at all before probing targets.
    pub preflight: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            preflight: true,
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Bodies smaller than this without a mount marker are degraded.
    pub min_body_bytes: usize,

    /// Upper bound on how much of a body is read for marker extraction.
    pub max_body_bytes: usize,

    /// Number of referenced assets to resolve per probe.
    pub asset_check_limit: usize,

    /// Substrings that identify the client-side app mount point.
    pub mount_markers: Vec<String>,

    /// User-Agent header sent with every probe.
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            min_body_bytes: 500,
            max_body_bytes: 1024 * 1024, // 1MB
            asset_check_limit: 5,
            mount_markers: vec![
                r#"id="root""#.to_string(),
                "id='root'".to_string(),
                "id=root".to_string(),
                r#"id="app""#.to_string(),
            ],
            user_agent: concat!("deploy-sweep/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per probe, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            max_delay_ms: 2000,
        }
    }
}

/// Sweep fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum targets processed at once.
    pub max_concurrency: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Remediation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Take actions. When false the sweep only reports what it would do.
    pub enabled: bool,

    /// Wait after an acknowledged action before the single re-probe.
    pub settle_secs: u64,

    /// Roll out a freshly published artifact with a forced redeploy.
    pub redeploy_after_publish: bool,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            settle_secs: 60,
            redeploy_after_publish: true,
        }
    }
}

/// Which orchestrator backend drives the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorKind {
    /// AWS ECS through the `aws` CLI.
    #[default]
    Ecs,
    /// Fixed table from this file.
    Static,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub kind: OrchestratorKind,

    /// ECS cluster name or ARN.
    pub cluster: Option<String>,

    /// AWS region passed to the CLI.
    pub region: Option<String>,

    /// AWS named profile passed to the CLI.
    pub profile: Option<String>,

    /// Path to the aws executable.
    pub aws_cli: String,

    /// Timeout for a single CLI invocation in seconds.
    pub command_timeout_secs: u64,

    /// Services known to the static backend.
    pub services: Vec<StaticServiceConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            kind: OrchestratorKind::Ecs,
            cluster: None,
            region: None,
            profile: None,
            aws_cli: "aws".to_string(),
            command_timeout_secs: 30,
            services: Vec::new(),
        }
    }
}

/// A service entry for the static orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticServiceConfig {
    pub id: String,

    /// Running task count.
    #[serde(default)]
    pub running: u32,

    /// Desired task count (defaults to 1).
    #[serde(default = "default_desired")]
    pub desired: u32,
}

fn default_desired() -> u32 {
    1
}

/// Build/push command configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// argv; `{service}` is replaced with the target's service id.
    pub command: Vec<String>,

    /// Working directory for the command.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Write Prometheus text exposition here after the sweep.
    pub metrics_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_file: None,
        }
    }
}

/// One service behind the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Logical name used in the report.
    pub name: String,

    /// Path prefix under the proxy (defaults to `name`).
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Orchestrator service identifier (defaults to `name`).
    #[serde(default)]
    pub service_id: Option<String>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path_prefix: None,
            service_id: None,
        }
    }
}
