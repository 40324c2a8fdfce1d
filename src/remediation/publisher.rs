//! Build/push collaborator.
//!
//! The sweep never looks inside a build. It hands over a service id and waits
//! for an acknowledgment carrying the new artifact's identifier.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::BuildConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("failed to start build command: {0}")]
    Spawn(String),

    #[error("build for '{service}' exited with {code:?}: {stderr}")]
    Failed {
        service: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Produces and publishes a new deployable artifact for a service.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Returns an identifier of the published artifact (tag, digest, ...).
    async fn rebuild_and_push(&self, service_id: &str) -> Result<String, PublishError>;
}

/// Runs an external command, e.g. a docker build/tag/push script.
///
/// `{service}` in any argument is replaced with the service id. Exit 0 is the
/// acknowledgment; the last non-empty stdout line is the artifact id.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    command: Vec<String>,
    working_dir: Option<String>,
}

impl CommandPublisher {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            working_dir: None,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            command: config.command.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    fn argv(&self, service_id: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace("{service}", service_id))
            .collect()
    }
}

#[async_trait]
impl ArtifactPublisher for CommandPublisher {
    async fn rebuild_and_push(&self, service_id: &str) -> Result<String, PublishError> {
        let argv = self.argv(service_id);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PublishError::Spawn("empty build command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::info!(service = %service_id, program = %program, "Starting rebuild and push");

        let output = cmd
            .output()
            .await
            .map_err(|e| PublishError::Spawn(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(PublishError::Failed {
                service: service_id.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let artifact = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("published")
            .to_string();

        tracing::info!(service = %service_id, artifact = %artifact, "Artifact published");
        Ok(artifact)
    }
}
