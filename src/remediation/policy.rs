//! Health state → remediation action policy.

use std::fmt;

use serde::Serialize;

use crate::health::HealthState;

/// Idempotent operations the sweep may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    ForceRedeploy,
    RebuildAndPush,
    None,
}

impl RemediationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::ForceRedeploy => "force_redeploy",
            RemediationAction::RebuildAndPush => "rebuild_and_push",
            RemediationAction::None => "none",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RemediationAction::None)
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choose the action for a classified target.
///
/// `running` is the orchestrator's running task count; it only matters for
/// `Unreachable` and is `None` when it could not be determined. Something
/// already running behind an unreachable route points at the proxy, not the
/// tasks, so it is left alone. Degraded pages are reported only: a restart
/// would hide a genuine application bug.
pub fn choose_action(state: HealthState, running: Option<u32>) -> RemediationAction {
    match (state, running) {
        (HealthState::Unreachable, Some(0)) => RemediationAction::ForceRedeploy,
        (HealthState::AssetFailure, _) => RemediationAction::RebuildAndPush,
        _ => RemediationAction::None,
    }
}
