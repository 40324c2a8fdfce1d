//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SweepConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Target list error{}: {reason}", line_suffix(.line))]
    TargetSyntax { line: Option<usize>, reason: String },
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(l) => format!(" at line {}", l),
        None => String::new(),
    }
}

/// Parse a TOML configuration file without semantic checks.
///
/// Command-line overrides are merged afterwards; the merged result is
/// validated when the sweep is built.
pub fn read_config(path: &Path) -> Result<SweepConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: SweepConfig = toml::from_str(&content)?;
    Ok(config)
}
