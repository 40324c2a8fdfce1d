//! deploy-sweep
//!
//! Health verification and remediation for web services behind a shared
//! reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   targets + config
//!         │
//!         ▼
//!   ┌───────────┐    ┌────────────┐    ┌──────────────┐    ┌──────────────┐
//!   │   probe   │───▶│   health   │───▶│ remediation  │───▶│ orchestrator │
//!   │  client   │    │ classifier │    │    policy    │    │  ecs/static  │
//!   └───────────┘    └────────────┘    └──────┬───────┘    └──────────────┘
//!         ▲                                   │ settle
//!         └───────────── re-probe ◀───────────┘
//!                          │
//!                          ▼
//!                    SweepReport → stdout, exit code
//! ```
//!
//! Exit codes: 0 all healthy, 2 something unreachable, 3 something degraded,
//! 1 configuration or fatal errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use deploy_sweep::config::targets::{load_target_list, parse_inline_target};
use deploy_sweep::config::{read_config, LogFormat, OrchestratorConfig, OrchestratorKind, SweepConfig};
use deploy_sweep::observability::{logging, metrics};
use deploy_sweep::orchestrator;
use deploy_sweep::remediation::CommandPublisher;
use deploy_sweep::sweep::{RemediationSweep, SweepReport};

#[derive(Parser)]
#[command(name = "deploy-sweep", version)]
#[command(
    about = "Probe services behind a shared proxy and remediate broken deployments",
    long_about = None
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe, classify and (with --remediate) fix every target
    Sweep {
        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        orchestrator: OrchestratorArgs,

        /// Seconds to wait after an action before re-probing
        #[arg(long)]
        settle_secs: Option<u64>,

        /// Take remediation actions instead of only reporting them
        #[arg(long)]
        remediate: bool,

        /// Write Prometheus metrics to this file after the sweep
        #[arg(long)]
        metrics_file: Option<String>,
    },
    /// Probe and classify only; never touches the orchestrator
    Probe {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Show running/desired counts and the current deployment of a service
    Status {
        #[arg(short, long)]
        service: String,

        #[command(flatten)]
        orchestrator: OrchestratorArgs,
    },
    /// Show the most recent orchestrator events of a service
    Events {
        #[arg(short, long)]
        service: String,

        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        #[command(flatten)]
        orchestrator: OrchestratorArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Target list file: `name [path_prefix [service_id]]` per line
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Inline target `name[:prefix[:service_id]]`, repeatable
    #[arg(short, long = "target")]
    target: Vec<String>,

    /// Base URL of the shared proxy
    #[arg(long)]
    proxy_base: Option<String>,

    /// Per-probe timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum targets in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip the proxy reachability check
    #[arg(long)]
    no_preflight: bool,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct OrchestratorArgs {
    /// ECS cluster
    #[arg(long)]
    cluster: Option<String>,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// AWS named profile
    #[arg(long)]
    profile: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl TargetArgs {
    fn apply(&self, config: &mut SweepConfig) -> anyhow::Result<()> {
        let mut targets = Vec::new();
        if let Some(path) = &self.targets {
            targets.extend(
                load_target_list(path)
                    .with_context(|| format!("reading target list {}", path.display()))?,
            );
        }
        for raw in &self.target {
            targets.push(parse_inline_target(raw)?);
        }
        if !targets.is_empty() {
            config.targets = targets;
        }

        if let Some(base) = &self.proxy_base {
            config.proxy.base_url = base.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.probe.timeout_secs = secs;
        }
        if let Some(n) = self.concurrency {
            config.sweep.max_concurrency = n;
        }
        if self.no_preflight {
            config.proxy.preflight = false;
        }
        Ok(())
    }
}

impl OrchestratorArgs {
    fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(cluster) = &self.cluster {
            config.kind = OrchestratorKind::Ecs;
            config.cluster = Some(cluster.clone());
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "deploy-sweep failed");
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => SweepConfig::default(),
    };

    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        };
    }
    logging::init_logging(&config.observability.log_level, config.observability.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "deploy-sweep starting");

    match cli.command {
        Commands::Sweep {
            targets,
            orchestrator: orchestrator_args,
            settle_secs,
            remediate,
            metrics_file,
        } => {
            targets.apply(&mut config)?;
            orchestrator_args.apply(&mut config.orchestrator);
            if let Some(secs) = settle_secs {
                config.remediation.settle_secs = secs;
            }
            if remediate {
                config.remediation.enabled = true;
            }
            if metrics_file.is_some() {
                config.observability.metrics_file = metrics_file;
            }

            let metrics_handle = config
                .observability
                .metrics_file
                .as_ref()
                .and_then(|_| metrics::init_metrics());
            let metrics_path = config.observability.metrics_file.clone();

            let sweep = RemediationSweep::new(config)?;
            let adapter = orchestrator::from_config(&sweep.config().orchestrator)
                .context("configuring orchestrator")?;
            let publisher = sweep.config().build.as_ref().map(CommandPublisher::from_config);

            let mut sweep = sweep.with_orchestrator(adapter);
            if let Some(publisher) = publisher {
                sweep = sweep.with_publisher(Arc::new(publisher));
            }

            let report = sweep.run().await?;
            print_report(&report, targets.format)?;

            if let (Some(handle), Some(path)) = (metrics_handle, metrics_path) {
                metrics::write_metrics_file(&handle, path.as_ref())
                    .with_context(|| format!("writing metrics to {}", path))?;
            }

            Ok(ExitCode::from(report.exit_status().code()))
        }
        Commands::Probe { targets } => {
            targets.apply(&mut config)?;
            config.remediation.enabled = false;
            // Probing never consults the orchestrator, so its settings are moot.
            config.orchestrator = OrchestratorConfig {
                kind: OrchestratorKind::Static,
                ..OrchestratorConfig::default()
            };

            let report = RemediationSweep::new(config)?.run().await?;
            print_report(&report, targets.format)?;
            Ok(ExitCode::from(report.exit_status().code()))
        }
        Commands::Status {
            service,
            orchestrator: orchestrator_args,
        } => {
            orchestrator_args.apply(&mut config.orchestrator);
            let adapter = orchestrator::from_config(&config.orchestrator)?;
            let status = adapter.describe_service(&service).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Events {
            service,
            count,
            orchestrator: orchestrator_args,
        } => {
            orchestrator_args.apply(&mut config.orchestrator);
            let adapter = orchestrator::from_config(&config.orchestrator)?;
            for event in adapter.tail_recent_events(&service, count).await? {
                let at = event
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {}", at, event.message);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_report(report: &SweepReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => print!("{}", report.render_table()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}
