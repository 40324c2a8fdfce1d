//! Service targets and target-list parsing.
//!
//! A target list is plain text, one service per line:
//!
//! ```text
//! # name      path_prefix   service_id
//! admin       admin         admin-portal
//! storefront
//! ```
//!
//! Inline targets on the command line use `name[:prefix[:service_id]]`.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::config::loader::ConfigError;
use crate::config::schema::TargetConfig;

/// One deployed application behind the shared proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTarget {
    name: String,
    path_prefix: String,
    service_id: String,
}

impl ServiceTarget {
    pub fn new(
        name: impl Into<String>,
        path_prefix: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path_prefix: path_prefix.into().trim_matches('/').to_string(),
            service_id: service_id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix without leading or trailing slashes.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (/{})", self.name, self.path_prefix)
    }
}

impl From<&TargetConfig> for ServiceTarget {
    fn from(config: &TargetConfig) -> Self {
        let prefix = config.path_prefix.as_deref().unwrap_or(&config.name);
        let service_id = config.service_id.as_deref().unwrap_or(&config.name);
        ServiceTarget::new(config.name.clone(), prefix, service_id)
    }
}

/// Parse a single `name[:prefix[:service_id]]` entry.
pub fn parse_inline_target(raw: &str) -> Result<TargetConfig, ConfigError> {
    let mut parts = raw.split(':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(ConfigError::TargetSyntax {
            line: None,
            reason: format!("empty target name in '{}'", raw),
        });
    }

    let path_prefix = parts.next().map(|p| p.trim().to_string());
    let service_id = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if parts.next().is_some() {
        return Err(ConfigError::TargetSyntax {
            line: None,
            reason: format!("too many fields in '{}'", raw),
        });
    }

    Ok(TargetConfig {
        name: name.to_string(),
        path_prefix,
        service_id,
    })
}

/// Parse the contents of a target-list file.
pub fn parse_target_list(content: &str) -> Result<Vec<TargetConfig>, ConfigError> {
    let mut targets = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() > 3 {
            return Err(ConfigError::TargetSyntax {
                line: Some(idx + 1),
                reason: format!("expected at most 3 fields, found {}", fields.len()),
            });
        }

        targets.push(TargetConfig {
            name: fields[0].to_string(),
            path_prefix: fields.get(1).map(|s| s.to_string()),
            service_id: fields.get(2).map(|s| s.to_string()),
        });
    }

    Ok(targets)
}

/// Read and parse a target-list file from disk.
pub fn load_target_list(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_target_list(&content)
}
