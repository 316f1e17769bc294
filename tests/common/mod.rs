//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::Request, routing::any, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gatekeeper::config::GatekeeperConfig;
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::Shutdown;

/// Start a mock upstream that echoes the method, path, query and request ID.
///
/// Paths starting with `/api/slow` sleep for two seconds first.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(any(|request: Request| async move {
        if request.uri().path().starts_with("/api/slow") {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Json(json!({
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "query": request.uri().query(),
            "request_id": request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok()),
        }))
    }));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Run the gateway on an ephemeral port until the returned `Shutdown` fires.
#[allow(dead_code)]
pub async fn start_gateway(
    mut config: GatekeeperConfig,
) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<GatekeeperConfig>) {
    config.observability.metrics_enabled = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown, updates_tx)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
