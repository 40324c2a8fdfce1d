//! Probe outcome types and transport error definitions.

use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Signals scanned out of a response body. Counts only, never content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Markers {
    /// A client-side app mount point is present.
    pub mount_point: bool,
    /// Number of `<script src=...>` references.
    pub script_refs: usize,
    /// Number of `<link rel=stylesheet href=...>` references.
    pub stylesheet_refs: usize,
}

/// One referenced asset that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAsset {
    pub url: String,
    /// HTTP status, absent on transport failure.
    pub status: Option<u16>,
    pub reason: String,
}

/// Aggregate of the secondary asset checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssetCheck {
    /// Every checked asset returned 2xx.
    AllOk { checked: usize },
    /// At least one checked asset failed.
    SomeFailed {
        checked: usize,
        failed: Vec<FailedAsset>,
    },
    /// No asset was checked (none referenced, or probe was not 2xx).
    NoneChecked,
}

impl AssetCheck {
    pub fn has_failures(&self) -> bool {
        matches!(self, AssetCheck::SomeFailed { .. })
    }
}

/// Outcome of one HTTP probe that produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub url: String,
    pub status: u16,
    /// Bytes read from the body (bounded by the configured cap).
    pub body_bytes: usize,
    /// The body exceeded the cap and was not read to the end.
    pub truncated: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub markers: Markers,
    pub assets: AssetCheck,
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Transport-level probe failures. Each kind is distinct so callers can
/// tell a dead proxy from a broken application.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("connection refused")]
    ConnectionRefused,

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid probe URL: {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::ConnectionRefused => "connection_refused",
            ProbeError::Dns(_) => "dns",
            ProbeError::Tls(_) => "tls",
            ProbeError::Connect(_) => "connect",
            ProbeError::InvalidUrl(_) => "invalid_url",
        }
    }

    /// Whether a caller-side retry can change the outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProbeError::InvalidUrl(_))
    }
}

/// Either a response or a transport failure.
pub type ProbeOutcome = Result<ProbeResult, ProbeError>;
