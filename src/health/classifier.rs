//! Probe outcome classification.
//!
//! Ordered rules, first match wins:
//!
//! ```text
//! 1. transport error                          → Unreachable
//! 2. status outside 200-299                   → Unreachable
//! 3. body < min_body_bytes, no mount marker   → Degraded
//! 4. mount marker, zero script references     → Degraded   (white page)
//! 5. scripts referenced, an asset failed      → AssetFailure
//! 6. scripts referenced, assets ok/unchecked  → Healthy
//! 7. anything else                            → Unknown
//! ```

use crate::config::ProbeConfig;
use crate::health::state::HealthState;
use crate::probe::{ProbeOutcome, ProbeResult};

/// Pure mapping from a probe outcome to a health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthClassifier {
    min_body_bytes: usize,
}

impl HealthClassifier {
    pub fn new(min_body_bytes: usize) -> Self {
        Self { min_body_bytes }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.min_body_bytes)
    }

    /// Total over every outcome; never fails.
    pub fn classify(&self, outcome: &ProbeOutcome) -> HealthState {
        match outcome {
            Err(_) => HealthState::Unreachable,
            Ok(result) => self.classify_result(result),
        }
    }

    pub fn classify_result(&self, result: &ProbeResult) -> HealthState {
        let markers = &result.markers;

        if !result.is_success() {
            HealthState::Unreachable
        } else if result.body_bytes < self.min_body_bytes && !markers.mount_point {
            HealthState::Degraded
        } else if markers.mount_point && markers.script_refs == 0 {
            HealthState::Degraded
        } else if markers.script_refs > 0 && result.assets.has_failures() {
            HealthState::AssetFailure
        } else if markers.script_refs > 0 {
            HealthState::Healthy
        } else {
            HealthState::Unknown
        }
    }
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}
