//! HTTP probe client.
//!
//! # Responsibilities
//! - GET `{proxy}/{prefix}/` for a target with a hard deadline
//! - Read a bounded prefix of the body and scan it for markers
//! - Resolve the first few referenced assets with secondary GETs
//! - Map transport failures to distinct error kinds
//!
//! No retries happen here; retry policy belongs to the caller.

use std::error::Error as _;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use reqwest::Client;
use tokio::time;
use url::Url;

use crate::config::{ProbeConfig, ServiceTarget};
use crate::probe::markers;
use crate::probe::types::{AssetCheck, FailedAsset, ProbeError, ProbeOutcome, ProbeResult};

/// Issues probes against services behind one shared proxy.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    http: Client,
    /// Proxy base without a trailing slash.
    base: String,
    config: ProbeConfig,
}

struct Page {
    status: u16,
    body: Vec<u8>,
    truncated: bool,
}

impl ProbeClient {
    /// Create a client for the proxy at `base_url`.
    pub fn new(base_url: &str, config: ProbeConfig) -> Result<Self, ProbeError> {
        let base = base_url.trim_end_matches('/').to_string();
        Url::parse(&base).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        Ok(Self { http, base, config })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Default per-probe deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// URL of a target's index page.
    pub fn page_url(&self, target: &ServiceTarget) -> Result<Url, ProbeError> {
        let raw = if target.path_prefix().is_empty() {
            format!("{}/", self.base)
        } else {
            format!("{}/{}/", self.base, target.path_prefix())
        };
        Url::parse(&raw).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Check the proxy answers at all. Any HTTP status counts as reachable.
    pub async fn preflight(&self) -> Result<u16, ProbeError> {
        let url = format!("{}/", self.base);
        let timeout = self.timeout();

        match time::timeout(timeout, self.http.get(&url).send()).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(e)) => Err(transport_error(&e, timeout)),
            Err(_) => Err(ProbeError::Timeout(timeout.as_secs())),
        }
    }

    /// Probe a target with the configured deadline.
    pub async fn probe(&self, target: &ServiceTarget) -> ProbeOutcome {
        self.probe_with_timeout(target, self.timeout()).await
    }

    /// Probe a target. `timeout` bounds the index request including the body
    /// read; each asset check gets its own `timeout`.
    pub async fn probe_with_timeout(
        &self,
        target: &ServiceTarget,
        timeout: Duration,
    ) -> ProbeOutcome {
        let url = self.page_url(target)?;
        let started = Instant::now();

        let page = match time::timeout(timeout, self.fetch_page(&url, timeout)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProbeError::Timeout(timeout.as_secs())),
        };
        let elapsed = started.elapsed();

        let Page {
            status,
            body,
            truncated,
        } = page;
        let body_bytes = body.len();

        let scan = if (200..300).contains(&status) && !body.is_empty() {
            Some(markers::scan(
                &String::from_utf8_lossy(&body),
                &self.config.mount_markers,
            ))
        } else {
            None
        };
        drop(body);

        let (markers, assets) = match scan {
            Some(scan) => {
                let assets = self.check_assets(&url, &scan.asset_refs, timeout).await;
                (scan.markers, assets)
            }
            None => (Default::default(), AssetCheck::NoneChecked),
        };

        let result = ProbeResult {
            url: url.to_string(),
            status,
            body_bytes,
            truncated,
            elapsed,
            markers,
            assets,
        };

        tracing::debug!(
            service = %target.name(),
            status = result.status,
            bytes = result.body_bytes,
            scripts = result.markers.script_refs,
            elapsed_ms = elapsed.as_millis() as u64,
            "Probe completed"
        );

        Ok(result)
    }

    async fn fetch_page(&self, url: &Url, timeout: Duration) -> Result<Page, ProbeError> {
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        let status = response.status().as_u16();
        let cap = self.config.max_body_bytes;
        let mut body = Vec::new();
        let mut truncated = false;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(&e, timeout))?
        {
            let room = cap - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Page {
            status,
            body,
            truncated,
        })
    }

    /// Resolve up to `asset_check_limit` references concurrently.
    async fn check_assets(&self, page: &Url, refs: &[String], timeout: Duration) -> AssetCheck {
        let urls: Vec<Url> = refs
            .iter()
            .filter_map(|r| self.resolve_asset(page, r))
            .take(self.config.asset_check_limit)
            .collect();

        if urls.is_empty() {
            return AssetCheck::NoneChecked;
        }

        let checks = urls.iter().map(|url| self.check_asset(url, timeout));
        let failed: Vec<FailedAsset> = join_all(checks).await.into_iter().flatten().collect();

        if failed.is_empty() {
            AssetCheck::AllOk {
                checked: urls.len(),
            }
        } else {
            AssetCheck::SomeFailed {
                checked: urls.len(),
                failed,
            }
        }
    }

    async fn check_asset(&self, url: &Url, timeout: Duration) -> Option<FailedAsset> {
        let outcome = time::timeout(timeout, self.http.get(url.clone()).send()).await;

        let (status, reason) = match outcome {
            Ok(Ok(response)) if response.status().is_success() => return None,
            Ok(Ok(response)) => (
                Some(response.status().as_u16()),
                format!("status {}", response.status()),
            ),
            Ok(Err(e)) => (None, transport_error(&e, timeout).to_string()),
            Err(_) => (None, ProbeError::Timeout(timeout.as_secs()).to_string()),
        };

        tracing::debug!(asset = %url, ?status, reason = %reason, "Asset check failed");
        Some(FailedAsset {
            url: url.to_string(),
            status,
            reason,
        })
    }

    /// Root-relative paths resolve under the proxy base, relative paths
    /// against the page, absolute URLs as-is. Non-HTTP schemes are skipped.
    fn resolve_asset(&self, page: &Url, raw: &str) -> Option<Url> {
        let resolved = if raw.starts_with('/') && !raw.starts_with("//") {
            Url::parse(&format!("{}{}", self.base, raw)).ok()?
        } else {
            page.join(raw).ok()?
        };

        match resolved.scheme() {
            "http" | "https" => Some(resolved),
            _ => None,
        }
    }
}

/// Map a reqwest failure onto a distinct transport kind.
fn transport_error(err: &reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout(timeout.as_secs());
    }
    if err.is_builder() {
        return ProbeError::InvalidUrl(err.to_string());
    }

    let mut messages = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return ProbeError::ConnectionRefused;
            }
        }
        messages.push(cause.to_string());
        source = cause.source();
    }

    let detail = messages.join(": ");
    let lower = detail.to_ascii_lowercase();
    if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
    {
        ProbeError::Dns(detail)
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        ProbeError::Tls(detail)
    } else if lower.contains("connection refused") {
        ProbeError::ConnectionRefused
    } else {
        ProbeError::Connect(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ProbeClient {
        ProbeClient::new(base, ProbeConfig::default()).unwrap()
    }

    #[test]
    fn test_page_url() {
        let c = client("http://alb.example.com/");
        let t = ServiceTarget::new("admin", "admin", "admin-portal");
        assert_eq!(c.page_url(&t).unwrap().as_str(), "http://alb.example.com/admin/");

        let root = ServiceTarget::new("home", "", "home");
        assert_eq!(c.page_url(&root).unwrap().as_str(), "http://alb.example.com/");
    }

    #[test]
    fn test_resolve_asset() {
        let c = client("http://alb.example.com/prod");
        let page = Url::parse("http://alb.example.com/prod/admin/").unwrap();

        assert_eq!(
            c.resolve_asset(&page, "/assets/index.js").unwrap().as_str(),
            "http://alb.example.com/prod/assets/index.js"
        );
        assert_eq!(
            c.resolve_asset(&page, "static/main.css").unwrap().as_str(),
            "http://alb.example.com/prod/admin/static/main.css"
        );
        assert_eq!(
            c.resolve_asset(&page, "https://cdn.example.com/x.js").unwrap().host_str(),
            Some("cdn.example.com")
        );
        assert!(c.resolve_asset(&page, "data:text/javascript,1").is_none());
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(matches!(
            ProbeClient::new("not a url", ProbeConfig::default()),
            Err(ProbeError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_distinct() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = client(&format!("http://{}", addr));
        let target = ServiceTarget::new("admin", "admin", "admin");
        let err = c.probe(&target).await.unwrap_err();
        assert_eq!(err, ProbeError::ConnectionRefused);
    }
}
