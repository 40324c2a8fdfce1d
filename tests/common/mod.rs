//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use deploy_sweep::config::schema::OrchestratorKind;
use deploy_sweep::config::{SweepConfig, TargetConfig};

/// A healthy single-page-app index document.
pub const SPA_INDEX: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Portal</title>
    <link rel="stylesheet" href="/static/css/main.css">
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
    <script defer src="/static/js/main.js"></script>
    <!-- padding so the document clears the minimum body size ................
         ....................................................................
         ....................................................................
         ....................................................................
         .................................................................. -->
  </body>
</html>
"#;

/// The classic white page: a mount point and nothing to fill it.
pub const WHITE_PAGE: &str = r#"<!doctype html><html><body><div id="root"></div></body></html>"#;

/// Start a mock proxy on an ephemeral port. `route` maps a request path to
/// `(status, body)`; `None` accepts the connection and never answers.
pub async fn start_mock_proxy<F>(route: F) -> SocketAddr
where
    F: Fn(&str) -> Option<(u16, String)> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let route = Arc::new(route);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let route = route.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };

                        let Some((status, body)) = route(&path) else {
                            tokio::time::sleep(Duration::from_secs(3600)).await;
                            return;
                        };

                        let response = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Serve a healthy app at every prefix in `healthy`, its assets included,
/// and 404 everything else.
pub async fn start_spa_proxy(healthy: &'static [&'static str]) -> SocketAddr {
    start_mock_proxy(move |path| {
        if path == "/" || path.starts_with("/static/") {
            return Some((200, "ok".to_string()));
        }
        if healthy.iter().any(|p| path == format!("/{}/", p)) {
            return Some((200, SPA_INDEX.to_string()));
        }
        Some((404, "not found".to_string()))
    })
    .await
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Sweep configuration pointing at a mock proxy, with a static orchestrator
/// and fast timings.
pub fn test_config(addr: SocketAddr, targets: &[&str]) -> SweepConfig {
    let mut config = SweepConfig::default();
    config.proxy.base_url = format!("http://{}", addr);
    config.probe.timeout_secs = 2;
    config.retries.max_attempts = 1;
    config.retries.base_delay_ms = 10;
    config.remediation.settle_secs = 0;
    config.orchestrator.kind = OrchestratorKind::Static;
    config.targets = targets.iter().map(|t| TargetConfig::new(*t)).collect();
    config
}
