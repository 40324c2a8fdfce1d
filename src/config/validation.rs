//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, concurrency >= 1)
//! - Check referential integrity (unique target names, backend settings)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SweepConfig → Result<(), Vec<ValidationError>>
//! - Runs before any probe is issued

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{OrchestratorKind, SweepConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &SweepConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.proxy.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "proxy.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "proxy.base_url",
            format!("invalid URL '{}': {}", config.proxy.base_url, e),
        )),
    }

    if config.probe.timeout_secs == 0 {
        errors.push(ValidationError::new("probe.timeout_secs", "must be greater than 0"));
    }
    if config.probe.max_body_bytes < config.probe.min_body_bytes {
        errors.push(ValidationError::new(
            "probe.max_body_bytes",
            "must not be smaller than probe.min_body_bytes",
        ));
    }
    if config.probe.mount_markers.iter().any(|m| m.is_empty()) {
        errors.push(ValidationError::new("probe.mount_markers", "markers must be non-empty"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.sweep.max_concurrency == 0 {
        errors.push(ValidationError::new("sweep.max_concurrency", "must be at least 1"));
    }

    match config.orchestrator.kind {
        OrchestratorKind::Ecs => {
            if config.orchestrator.cluster.as_deref().unwrap_or_default().is_empty() {
                errors.push(ValidationError::new(
                    "orchestrator.cluster",
                    "required for the ecs orchestrator",
                ));
            }
            if config.orchestrator.command_timeout_secs == 0 {
                errors.push(ValidationError::new(
                    "orchestrator.command_timeout_secs",
                    "must be greater than 0",
                ));
            }
        }
        OrchestratorKind::Static => {
            let mut seen = HashSet::new();
            for service in &config.orchestrator.services {
                if !seen.insert(service.id.as_str()) {
                    errors.push(ValidationError::new(
                        "orchestrator.services",
                        format!("duplicate service id '{}'", service.id),
                    ));
                }
            }
        }
    }

    if let Some(build) = &config.build {
        if build.command.first().map(|c| c.trim().is_empty()).unwrap_or(true) {
            errors.push(ValidationError::new("build.command", "must name a program"));
        }
    }

    if config.targets.is_empty() {
        errors.push(ValidationError::new("targets", "at least one target is required"));
    }
    let mut names = HashSet::new();
    for (i, target) in config.targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("targets[{}].name", i), "must be non-empty"));
        } else if !names.insert(target.name.as_str()) {
            errors.push(ValidationError::new(
                format!("targets[{}].name", i),
                format!("duplicate target '{}'", target.name),
            ));
        }
        if let Some(prefix) = &target.path_prefix {
            if prefix.chars().any(char::is_whitespace) {
                errors.push(ValidationError::new(
                    format!("targets[{}].path_prefix", i),
                    "must not contain whitespace",
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
