//! End-to-end sweeps against a mock proxy and an in-memory orchestrator.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use deploy_sweep::config::schema::BuildConfig;
use deploy_sweep::orchestrator::static_table::StaticOrchestrator;
use deploy_sweep::orchestrator::{
    OrchestratorAdapter, OrchestratorError, OrchestratorResult, RedeployAck, ServiceEvent,
    ServiceStatus,
};
use deploy_sweep::remediation::CommandPublisher;
use deploy_sweep::sweep::{ActionOutcome, ExitStatus, SweepError, TargetFailure};
use deploy_sweep::{HealthState, RemediationAction, RemediationSweep};

use common::{start_mock_proxy, start_spa_proxy, test_config, SPA_INDEX};

/// Static table that flips `healed` once a redeploy is accepted.
struct RecoveringOrchestrator {
    inner: StaticOrchestrator,
    healed: Arc<AtomicBool>,
}

#[async_trait]
impl OrchestratorAdapter for RecoveringOrchestrator {
    fn backend(&self) -> &'static str {
        "recovering"
    }

    async fn describe_service(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        self.inner.describe_service(service_id).await
    }

    async fn force_redeploy(&self, service_id: &str) -> OrchestratorResult<RedeployAck> {
        let ack = self.inner.force_redeploy(service_id).await?;
        self.healed.store(true, Ordering::SeqCst);
        Ok(ack)
    }

    async fn tail_recent_events(
        &self,
        service_id: &str,
        count: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>> {
        self.inner.tail_recent_events(service_id, count).await
    }
}

#[tokio::test]
async fn test_report_keeps_input_order() {
    let addr = start_spa_proxy(&["a", "b", "d", "f"]).await;
    let config = test_config(addr, &["a", "b", "c", "d", "e", "f"]);

    let report = RemediationSweep::new(config).unwrap().run().await.unwrap();

    let names: Vec<&str> = report.entries.iter().map(|e| e.target.name()).collect();
    assert_eq!(names, ["a", "b", "c", "d", "e", "f"]);
    assert_eq!(report.entries[0].before_state(), HealthState::Healthy);
    assert_eq!(report.entries[2].before_state(), HealthState::Unreachable);
    assert_eq!(report.exit_status(), ExitStatus::SomeUnreachable);
}

#[tokio::test]
async fn test_hung_target_does_not_block_others() {
    let addr = start_mock_proxy(|path| {
        if path == "/stuck/" {
            return None;
        }
        if path.starts_with("/static/") || path == "/" {
            return Some((200, "ok".to_string()));
        }
        Some((200, SPA_INDEX.to_string()))
    })
    .await;

    let mut config = test_config(addr, &["a", "b", "stuck", "c", "d", "e"]);
    config.probe.timeout_secs = 1;
    config.sweep.max_concurrency = 6;

    let started = Instant::now();
    let report = RemediationSweep::new(config).unwrap().run().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.entries.len(), 6);
    assert_eq!(report.entries[2].target.name(), "stuck");
    assert_eq!(report.entries[2].final_state(), HealthState::Unreachable);
    for i in [0, 1, 3, 4, 5] {
        assert_eq!(report.entries[i].final_state(), HealthState::Healthy);
    }
}

#[tokio::test]
async fn test_dry_run_never_redeploys() {
    let addr = start_mock_proxy(|_| Some((503, "down".to_string()))).await;
    let config = test_config(addr, &["billing"]);
    let orchestrator = Arc::new(StaticOrchestrator::new().with_service("billing", 0));

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator.clone())
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.running_count, Some(0));
    assert_eq!(entry.action, RemediationAction::ForceRedeploy);
    assert_eq!(entry.action_outcome, ActionOutcome::DryRun);
    assert!(entry.after.is_none());
    assert_eq!(orchestrator.redeploy_count("billing"), 0);
}

#[tokio::test]
async fn test_redeploy_recovers_service() {
    let healed = Arc::new(AtomicBool::new(false));
    let flag = healed.clone();
    let addr = start_mock_proxy(move |path| {
        if path == "/" || path.starts_with("/static/") {
            return Some((200, "ok".to_string()));
        }
        if flag.load(Ordering::SeqCst) {
            Some((200, SPA_INDEX.to_string()))
        } else {
            Some((503, "no healthy upstream".to_string()))
        }
    })
    .await;

    let mut config = test_config(addr, &["billing"]);
    config.remediation.enabled = true;
    let orchestrator = Arc::new(RecoveringOrchestrator {
        inner: StaticOrchestrator::new().with_service("billing", 0),
        healed,
    });

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator.clone())
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.before_state(), HealthState::Unreachable);
    assert_eq!(entry.action, RemediationAction::ForceRedeploy);
    assert!(entry.action_outcome.is_acknowledged());
    assert_eq!(entry.after.as_ref().map(|o| o.state), Some(HealthState::Healthy));
    assert_eq!(entry.after.as_ref().map(|o| o.attempts), Some(1));
    assert_eq!(orchestrator.inner.redeploy_count("billing"), 1);
    assert_eq!(report.exit_status(), ExitStatus::AllHealthy);
}

#[tokio::test]
async fn test_running_tasks_suppress_redeploy() {
    let addr = start_mock_proxy(|_| Some((502, "bad gateway".to_string()))).await;
    let mut config = test_config(addr, &["search"]);
    config.remediation.enabled = true;
    let orchestrator = Arc::new(StaticOrchestrator::new().with_service("search", 2));

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator.clone())
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.running_count, Some(2));
    assert_eq!(entry.action, RemediationAction::None);
    assert_eq!(orchestrator.redeploy_count("search"), 0);
}

#[tokio::test]
async fn test_unknown_service_is_reported() {
    let addr = start_mock_proxy(|_| Some((503, "down".to_string()))).await;
    let config = test_config(addr, &["ghost"]);

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(Arc::new(StaticOrchestrator::new()))
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(
        entry.failure,
        Some(TargetFailure::OrchestratorNotFound {
            service_id: "ghost".to_string()
        })
    );
    assert_eq!(entry.action, RemediationAction::None);
    assert_eq!(report.exit_status(), ExitStatus::SomeUnreachable);
}

#[tokio::test]
async fn test_asset_failure_rebuilds_and_redeploys() {
    let addr = start_mock_proxy(|path| match path {
        "/" => Some((200, "ok".to_string())),
        "/shop/" => Some((200, SPA_INDEX.to_string())),
        _ => Some((404, "not found".to_string())),
    })
    .await;

    let mut config = test_config(addr, &["shop"]);
    config.remediation.enabled = true;
    let build = BuildConfig {
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo building {service}; echo registry/{service}:fixed".to_string(),
        ],
        working_dir: None,
    };
    let orchestrator = Arc::new(StaticOrchestrator::new().with_service("shop", 1));

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator.clone())
        .with_publisher(Arc::new(CommandPublisher::from_config(&build)))
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.before_state(), HealthState::AssetFailure);
    assert_eq!(entry.action, RemediationAction::RebuildAndPush);
    match &entry.action_outcome {
        ActionOutcome::Acknowledged { detail } => {
            assert!(detail.contains("registry/shop:fixed"), "{}", detail)
        }
        other => panic!("expected acknowledged, got {:?}", other),
    }
    assert_eq!(orchestrator.redeploy_count("shop"), 1);
    // Assets are still missing on the mock, so the re-probe agrees.
    assert_eq!(entry.final_state(), HealthState::AssetFailure);
    assert_eq!(report.exit_status(), ExitStatus::SomeDegraded);
}

#[tokio::test]
async fn test_asset_failure_without_build_is_skipped() {
    let addr = start_mock_proxy(|path| match path {
        "/shop/" => Some((200, SPA_INDEX.to_string())),
        _ => Some((404, "not found".to_string())),
    })
    .await;

    let mut config = test_config(addr, &["shop"]);
    config.remediation.enabled = true;

    let report = RemediationSweep::new(config).unwrap().run().await.unwrap();

    assert_eq!(
        report.entries[0].action_outcome,
        ActionOutcome::Skipped {
            reason: "no build command configured".to_string()
        }
    );
}

#[tokio::test]
async fn test_unreachable_proxy_fails_before_probing() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = test_config(addr, &["a", "b"]);
    let err = RemediationSweep::new(config).unwrap().run().await.unwrap_err();

    assert!(matches!(err, SweepError::Configuration(_)), "{:?}", err);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let addr = start_spa_proxy(&[]).await;
    let mut config = test_config(addr, &["a"]);
    config.sweep.max_concurrency = 0;
    config.targets.clear();

    match RemediationSweep::new(config) {
        Err(SweepError::Configuration(message)) => {
            assert!(message.contains("sweep.max_concurrency"), "{}", message);
            assert!(message.contains("targets"), "{}", message);
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("invalid configuration accepted"),
    }
}

/// Static table whose redeploys always fail with `error`.
struct RefusingOrchestrator {
    inner: StaticOrchestrator,
    error: OrchestratorError,
}

#[async_trait]
impl OrchestratorAdapter for RefusingOrchestrator {
    fn backend(&self) -> &'static str {
        "refusing"
    }

    async fn describe_service(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        self.inner.describe_service(service_id).await
    }

    async fn force_redeploy(&self, _service_id: &str) -> OrchestratorResult<RedeployAck> {
        Err(self.error.clone())
    }

    async fn tail_recent_events(
        &self,
        service_id: &str,
        count: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>> {
        self.inner.tail_recent_events(service_id, count).await
    }
}

/// `/shop/` serves an index whose bundle is missing.
async fn start_broken_shop_proxy() -> std::net::SocketAddr {
    start_mock_proxy(|path| match path {
        "/" => Some((200, "ok".to_string())),
        "/shop/" => Some((200, SPA_INDEX.to_string())),
        _ => Some((404, "not found".to_string())),
    })
    .await
}

fn marker_build(dir: &std::path::Path) -> CommandPublisher {
    CommandPublisher::from_config(&BuildConfig {
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("touch {}/built-{{service}}; echo registry/{{service}}:fixed", dir.display()),
        ],
        working_dir: None,
    })
}

#[tokio::test]
async fn test_unknown_service_is_never_rebuilt() {
    let addr = start_broken_shop_proxy().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = test_config(addr, &["shop"]);
    config.remediation.enabled = true;

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(Arc::new(StaticOrchestrator::new()))
        .with_publisher(Arc::new(marker_build(dir.path())))
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.before_state(), HealthState::AssetFailure);
    assert_eq!(
        entry.failure,
        Some(TargetFailure::OrchestratorNotFound {
            service_id: "shop".to_string()
        })
    );
    assert_eq!(entry.action, RemediationAction::None);
    assert!(entry.after.is_none());
    assert!(!dir.path().join("built-shop").exists());
    assert_eq!(report.exit_status(), ExitStatus::SomeUnreachable);
}

#[tokio::test]
async fn test_service_vanishing_before_redeploy_is_a_failure() {
    let addr = start_broken_shop_proxy().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = test_config(addr, &["shop"]);
    config.remediation.enabled = true;
    let orchestrator = RefusingOrchestrator {
        inner: StaticOrchestrator::new().with_service("shop", 1),
        error: OrchestratorError::NotFound("shop".to_string()),
    };

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(Arc::new(orchestrator))
        .with_publisher(Arc::new(marker_build(dir.path())))
        .run()
        .await
        .unwrap();

    let entry = &report.entries[0];
    assert!(dir.path().join("built-shop").exists());
    assert!(matches!(entry.action_outcome, ActionOutcome::Failed { .. }));
    assert_eq!(
        entry.failure,
        Some(TargetFailure::OrchestratorNotFound {
            service_id: "shop".to_string()
        })
    );
    assert!(entry.after.is_none());
    assert_eq!(report.exit_status(), ExitStatus::SomeUnreachable);
}

#[tokio::test]
async fn test_rejected_redeploy_is_recorded_and_neighbours_finish() {
    let addr = start_mock_proxy(|path| match path {
        "/" => Some((200, "ok".to_string())),
        "/portal/" => Some((200, SPA_INDEX.to_string())),
        p if p.starts_with("/static/") => Some((200, "ok".to_string())),
        _ => Some((503, "no healthy upstream".to_string())),
    })
    .await;

    let mut config = test_config(addr, &["billing", "portal"]);
    config.remediation.enabled = true;
    let orchestrator = RefusingOrchestrator {
        inner: StaticOrchestrator::new().with_service("billing", 0),
        error: OrchestratorError::Rejected {
            service: "billing".to_string(),
            reason: "service is draining".to_string(),
        },
    };

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(Arc::new(orchestrator))
        .run()
        .await
        .unwrap();

    let billing = &report.entries[0];
    assert_eq!(billing.action, RemediationAction::ForceRedeploy);
    match &billing.action_outcome {
        ActionOutcome::Failed { reason } => assert!(reason.contains("draining"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(billing.after.is_none());
    assert!(billing.failure.is_none());

    let portal = &report.entries[1];
    assert_eq!(portal.target.name(), "portal");
    assert_eq!(portal.final_state(), HealthState::Healthy);
    assert_eq!(report.exit_status(), ExitStatus::SomeUnreachable);
}

#[tokio::test]
async fn test_failing_build_is_recorded() {
    let addr = start_broken_shop_proxy().await;
    let mut config = test_config(addr, &["shop"]);
    config.remediation.enabled = true;

    let build = BuildConfig {
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo registry unreachable >&2; exit 3".to_string(),
        ],
        working_dir: None,
    };
    let orchestrator = Arc::new(StaticOrchestrator::new().with_service("shop", 1));

    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator.clone())
        .with_publisher(Arc::new(CommandPublisher::from_config(&build)))
        .run()
        .await
        .unwrap();

    let shop = &report.entries[0];
    match &shop.action_outcome {
        ActionOutcome::Failed { reason } => {
            assert!(reason.contains("registry unreachable"), "{}", reason)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(shop.after.is_none());
    assert!(shop.failure.is_none());
    assert_eq!(orchestrator.redeploy_count("shop"), 0);
    assert_eq!(report.exit_status(), ExitStatus::SomeDegraded);
}

#[tokio::test]
async fn test_concurrency_limit_serializes_targets() {
    let addr = start_mock_proxy(|path| match path {
        "/" => Some((200, "ok".to_string())),
        _ => None,
    })
    .await;

    let mut config = test_config(addr, &["slow-a", "slow-b"]);
    config.probe.timeout_secs = 1;
    config.sweep.max_concurrency = 1;

    let started = Instant::now();
    let report = RemediationSweep::new(config).unwrap().run().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    let names: Vec<&str> = report.entries.iter().map(|e| e.target.name()).collect();
    assert_eq!(names, ["slow-a", "slow-b"]);
    assert!(report
        .entries
        .iter()
        .all(|e| e.final_state() == HealthState::Unreachable));
}

#[tokio::test]
async fn test_settle_interval_does_not_hold_a_slot() {
    let addr = start_mock_proxy(|path| match path {
        "/" => Some((200, "ok".to_string())),
        _ => Some((503, "down".to_string())),
    })
    .await;

    let mut config = test_config(addr, &["billing", "search"]);
    config.sweep.max_concurrency = 1;
    config.remediation.enabled = true;
    config.remediation.settle_secs = 2;
    let orchestrator = Arc::new(
        StaticOrchestrator::new()
            .with_service("billing", 0)
            .with_service("search", 0),
    );

    let started = Instant::now();
    let report = RemediationSweep::new(config)
        .unwrap()
        .with_orchestrator(orchestrator)
        .run()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_millis(3500), "{:?}", elapsed);
    assert!(report.entries.iter().all(|e| e.after.is_some()));
}
