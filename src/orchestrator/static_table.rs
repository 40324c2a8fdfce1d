//! Orchestrator backed by a fixed table.
//!
//! Running counts come from configuration and never change on their own.
//! Redeploys are recorded and stay "in progress" until
//! [`StaticOrchestrator::complete_rollout`] is called.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::OrchestratorConfig;
use crate::orchestrator::{
    OrchestratorAdapter, OrchestratorError, OrchestratorResult, RedeployAck, ServiceEvent,
    ServiceStatus,
};

#[derive(Debug, Clone)]
struct Entry {
    running: u32,
    desired: u32,
    deployments: u32,
    in_progress: Option<String>,
    events: Vec<ServiceEvent>,
}

#[derive(Debug, Default)]
pub struct StaticOrchestrator {
    services: Mutex<HashMap<String, Entry>>,
}

impl StaticOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let orchestrator = Self::new();
        for service in &config.services {
            orchestrator.insert(&service.id, service.running, service.desired);
        }
        orchestrator
    }

    /// Register (or replace) a service.
    pub fn insert(&self, service_id: &str, running: u32, desired: u32) {
        let mut services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        services.insert(
            service_id.to_string(),
            Entry {
                running,
                desired,
                deployments: 0,
                in_progress: None,
                events: Vec::new(),
            },
        );
    }

    pub fn with_service(self, service_id: &str, running: u32) -> Self {
        self.insert(service_id, running, running.max(1));
        self
    }

    /// Finish the in-flight rollout with `running` tasks.
    pub fn complete_rollout(&self, service_id: &str, running: u32) -> OrchestratorResult<()> {
        let mut services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        let entry = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::NotFound(service_id.to_string()))?;

        if let Some(id) = entry.in_progress.take() {
            entry.running = running;
            push_event(entry, format!("(service {}) deployment {} completed.", service_id, id));
        }
        Ok(())
    }

    /// Number of rollouts actually started for a service.
    pub fn redeploy_count(&self, service_id: &str) -> u32 {
        let services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        services.get(service_id).map(|e| e.deployments).unwrap_or(0)
    }
}

fn push_event(entry: &mut Entry, message: String) {
    entry.events.push(ServiceEvent {
        id: Some(format!("evt-{}", entry.events.len() + 1)),
        created_at: Some(Utc::now()),
        message,
    });
}

#[async_trait]
impl OrchestratorAdapter for StaticOrchestrator {
    fn backend(&self) -> &'static str {
        "static"
    }

    async fn describe_service(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        let services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        let entry = services
            .get(service_id)
            .ok_or_else(|| OrchestratorError::NotFound(service_id.to_string()))?;

        Ok(ServiceStatus {
            service_id: service_id.to_string(),
            status: "ACTIVE".to_string(),
            running: entry.running,
            desired: entry.desired,
            pending: 0,
            deployment_id: entry.in_progress.clone(),
            rollout_in_progress: entry.in_progress.is_some(),
        })
    }

    async fn force_redeploy(&self, service_id: &str) -> OrchestratorResult<RedeployAck> {
        let mut services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        let entry = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::NotFound(service_id.to_string()))?;

        if let Some(id) = &entry.in_progress {
            return Ok(RedeployAck {
                service_id: service_id.to_string(),
                deployment_id: id.clone(),
                already_in_progress: true,
            });
        }

        entry.deployments += 1;
        let id = format!("static-{}-{}", service_id, entry.deployments);
        entry.in_progress = Some(id.clone());
        push_event(
            entry,
            format!("(service {}) has started a forced deployment {}.", service_id, id),
        );

        Ok(RedeployAck {
            service_id: service_id.to_string(),
            deployment_id: id,
            already_in_progress: false,
        })
    }

    async fn tail_recent_events(
        &self,
        service_id: &str,
        n: usize,
    ) -> OrchestratorResult<Vec<ServiceEvent>> {
        let services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        let entry = services
            .get(service_id)
            .ok_or_else(|| OrchestratorError::NotFound(service_id.to_string()))?;

        Ok(entry.events.iter().rev().take(n).cloned().collect())
    }
}
