//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sweep_probes_total` (counter): probes by service, outcome
//! - `sweep_probe_duration_seconds` (histogram): index request latency
//! - `sweep_remediations_total` (counter): actions by service, action, result
//! - `sweep_service_health` (gauge): 1 for the service's current state, 0 otherwise
//!
//! Without an installed recorder every call is a no-op. With
//! `observability.metrics_file` set, a Prometheus recorder is installed and
//! the rendering is written out once the sweep finishes.

use std::path::Path;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::health::HealthState;
use crate::probe::ProbeOutcome;
use crate::remediation::RemediationAction;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}

/// Write the current rendering to `path` (textfile collector format).
pub fn write_metrics_file(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())?;
    std::fs::rename(&tmp, path)
}

pub fn record_probe(service: &str, outcome: &ProbeOutcome) {
    let label = match outcome {
        Ok(result) => {
            histogram!("sweep_probe_duration_seconds", "service" => service.to_string())
                .record(result.elapsed.as_secs_f64());
            if result.is_success() {
                "success"
            } else {
                "http_error"
            }
        }
        Err(e) => e.kind(),
    };

    counter!(
        "sweep_probes_total",
        "service" => service.to_string(),
        "outcome" => label
    )
    .increment(1);
}

pub fn record_health(service: &str, state: HealthState) {
    for candidate in HealthState::ALL {
        let value = if candidate == state { 1.0 } else { 0.0 };
        gauge!(
            "sweep_service_health",
            "service" => service.to_string(),
            "state" => candidate.as_str()
        )
        .set(value);
    }
}

pub fn record_remediation(service: &str, action: RemediationAction, result: &'static str) {
    counter!(
        "sweep_remediations_total",
        "service" => service.to_string(),
        "action" => action.as_str(),
        "result" => result
    )
    .increment(1);
}
