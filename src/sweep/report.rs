//! Sweep report model and rendering.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::config::ServiceTarget;
use crate::health::HealthState;
use crate::probe::{AssetCheck, ProbeError, ProbeOutcome};
use crate::remediation::RemediationAction;

/// One probe of a target together with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub state: HealthState,
    /// Probe attempts made, including retries.
    pub attempts: u32,
    #[serde(rename = "probe", serialize_with = "outcome_json")]
    pub outcome: ProbeOutcome,
}

fn outcome_json<S: Serializer>(outcome: &ProbeOutcome, s: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Failed<'a> {
        error: &'a ProbeError,
    }

    match outcome {
        Ok(result) => result.serialize(s),
        Err(error) => Failed { error }.serialize(s),
    }
}

impl Observation {
    /// One-line description of the evidence behind the state.
    pub fn summary(&self) -> String {
        match &self.outcome {
            Err(e) => format!("{} ({})", e.kind(), e),
            Ok(r) if !r.is_success() => format!("HTTP {}", r.status),
            Ok(r) => {
                let mut s = format!(
                    "HTTP {}, {} bytes, mount={}, scripts={}, styles={}",
                    r.status,
                    r.body_bytes,
                    if r.markers.mount_point { "yes" } else { "no" },
                    r.markers.script_refs,
                    r.markers.stylesheet_refs,
                );
                if let AssetCheck::SomeFailed { checked, failed } = &r.assets {
                    let _ = write!(s, ", {}/{} assets failed", failed.len(), checked);
                    if let Some(first) = failed.first() {
                        let _ = write!(s, " ({} {})", first.url, first.reason);
                    }
                }
                s
            }
        }
    }
}

/// What happened to the chosen action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Policy chose no action.
    NotNeeded,
    /// Remediation disabled; the action was only reported.
    DryRun,
    /// Action could not be attempted.
    Skipped { reason: String },
    /// The orchestrator or build collaborator accepted the request.
    Acknowledged { detail: String },
    /// The request was attempted and refused.
    Failed { reason: String },
}

impl ActionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ActionOutcome::NotNeeded => "-",
            ActionOutcome::DryRun => "dry-run",
            ActionOutcome::Skipped { .. } => "skipped",
            ActionOutcome::Acknowledged { .. } => "acknowledged",
            ActionOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self, ActionOutcome::Acknowledged { .. })
    }
}

/// A target-level failure that is not a health state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetFailure {
    /// Configured service id is unknown to the orchestrator.
    OrchestratorNotFound { service_id: String },
    /// The orchestrator could not be queried.
    Orchestrator { reason: String },
}

impl std::fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetFailure::OrchestratorNotFound { service_id } => {
                write!(f, "orchestrator has no service '{}'", service_id)
            }
            TargetFailure::Orchestrator { reason } => write!(f, "orchestrator error: {}", reason),
        }
    }
}

/// Per-target row of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepEntry {
    pub target: ServiceTarget,
    pub before: Observation,
    /// Running task count, looked up only for unreachable targets.
    pub running_count: Option<u32>,
    pub action: RemediationAction,
    pub action_outcome: ActionOutcome,
    pub after: Option<Observation>,
    pub failure: Option<TargetFailure>,
}

impl SweepEntry {
    pub fn new(target: ServiceTarget, before: Observation) -> Self {
        Self {
            target,
            before,
            running_count: None,
            action: RemediationAction::None,
            action_outcome: ActionOutcome::NotNeeded,
            after: None,
            failure: None,
        }
    }

    pub fn before_state(&self) -> HealthState {
        self.before.state
    }

    /// State after remediation, or the initial state when nothing ran.
    pub fn final_state(&self) -> HealthState {
        self.after.as_ref().map(|o| o.state).unwrap_or(self.before.state)
    }

    fn detail(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.to_string();
        }
        match &self.action_outcome {
            ActionOutcome::Skipped { reason } | ActionOutcome::Failed { reason } => {
                return reason.clone()
            }
            ActionOutcome::Acknowledged { detail } => return detail.clone(),
            _ => {}
        }
        self.after.as_ref().unwrap_or(&self.before).summary()
    }
}

/// Process exit status derived from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    AllHealthy,
    SomeUnreachable,
    SomeDegraded,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::AllHealthy => 0,
            ExitStatus::SomeUnreachable => 2,
            ExitStatus::SomeDegraded => 3,
        }
    }
}

/// Full outcome of one sweep. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub proxy_base: String,
    pub remediation_enabled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn exit_status(&self) -> ExitStatus {
        if self
            .entries
            .iter()
            .any(|e| e.failure.is_some() || e.final_state() == HealthState::Unreachable)
        {
            ExitStatus::SomeUnreachable
        } else if self.entries.iter().all(|e| e.final_state().is_healthy()) {
            ExitStatus::AllHealthy
        } else {
            ExitStatus::SomeDegraded
        }
    }

    /// Number of entries ending in each state, in `HealthState::ALL` order.
    pub fn counts(&self) -> Vec<(HealthState, usize)> {
        HealthState::ALL
            .iter()
            .map(|s| (*s, self.entries.iter().filter(|e| e.final_state() == *s).count()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Fixed-width table for terminals.
    pub fn render_table(&self) -> String {
        let headers = ["TARGET", "BEFORE", "ACTION", "OUTCOME", "AFTER", "DETAIL"];
        let rows: Vec<[String; 6]> = self
            .entries
            .iter()
            .map(|e| {
                [
                    e.target.name().to_string(),
                    e.before_state().to_string(),
                    e.action.to_string(),
                    e.action_outcome.label().to_string(),
                    e.after
                        .as_ref()
                        .map(|o| o.state.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    e.detail(),
                ]
            })
            .collect();

        let mut widths = headers.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row.iter()) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        let mut line = |cells: [&str; 6]| {
            let last = cells.len() - 1;
            for (i, cell) in cells.iter().enumerate() {
                if i == last {
                    let _ = write!(out, "{}", cell);
                } else {
                    let _ = write!(out, "{:<width$}  ", cell, width = widths[i]);
                }
            }
            out.push('\n');
        };

        line(headers);
        for row in &rows {
            line([&row[0], &row[1], &row[2], &row[3], &row[4], &row[5]]);
        }

        let summary: Vec<String> = self
            .counts()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{} {}", n, s))
            .collect();
        let _ = writeln!(
            out,
            "\nsweep {}: {} target(s), {}{}",
            self.sweep_id,
            self.entries.len(),
            summary.join(", "),
            if self.remediation_enabled { "" } else { " (report only)" }
        );
        out
    }
}
