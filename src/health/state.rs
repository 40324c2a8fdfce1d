//! Service health states.
//!
//! # States
//! - Healthy: shell renders and every checked asset resolves
//! - Degraded: responds, but the app bundle is missing (white page)
//! - AssetFailure: bundle referenced but not servable
//! - Unreachable: transport failure or non-2xx index
//! - Unknown: nothing conclusive

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    AssetFailure,
    Unreachable,
    Unknown,
}

impl HealthState {
    pub const ALL: [HealthState; 5] = [
        HealthState::Healthy,
        HealthState::Degraded,
        HealthState::AssetFailure,
        HealthState::Unreachable,
        HealthState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::AssetFailure => "asset_failure",
            HealthState::Unreachable => "unreachable",
            HealthState::Unknown => "unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
