//! End-to-end tests for the rate limited gateway.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use gatekeeper::config::{GatekeeperConfig, IdentitySource};
use gatekeeper::http::TOO_MANY_REQUESTS_MESSAGE;

mod common;

fn config_for(upstream: std::net::SocketAddr) -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.upstream.address = upstream.to_string();
    config
}

#[tokio::test]
async fn test_admitted_requests_reach_upstream_with_quota_headers() {
    let upstream = common::start_echo_upstream().await;
    let (addr, shutdown, _updates) = common::start_gateway(config_for(upstream)).await;
    let client = common::client();

    let res = client
        .post(format!("http://{}/api/chat/completions?stream=false", addr))
        .header("x-forwarded-for", "203.0.113.9")
        .body("{}")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-limit"], "5");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "4");
    assert_eq!(res.headers()["x-ratelimit-reset"], "60");
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();

    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["path"], "/api/chat/completions");
    assert_eq!(echo["query"], "stream=false");
    assert_eq!(echo["request_id"], request_id.as_str());

    shutdown.trigger();
}

#[tokio::test]
async fn test_sixth_request_in_a_minute_is_rejected() {
    let upstream = common::start_echo_upstream().await;
    let (addr, shutdown, _updates) = common::start_gateway(config_for(upstream)).await;
    let client = common::client();
    let url = format!("http://{}/api/search", addr);

    for expected_remaining in ["4", "3", "2", "1", "0"] {
        let res = client
            .get(&url)
            .header("x-forwarded-for", "1.2.3.4, 10.0.0.1")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let res = client
        .get(&url)
        .header("x-forwarded-for", "1.2.3.4")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-limit"], "5");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    let reset = res.headers()["x-ratelimit-reset"].to_str().unwrap();
    assert!(reset == "59" || reset == "60", "unexpected reset {reset}");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], TOO_MANY_REQUESTS_MESSAGE);

    // A different caller still has its full quota.
    let res = client
        .get(&url)
        .header("x-forwarded-for", "5.6.7.8")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "4");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_timeout_is_gateway_timeout() {
    let upstream = common::start_echo_upstream().await;
    let mut config = config_for(upstream);
    // Tightest accepted pair: the upstream timeout fires before the request timeout.
    config.upstream.timeout_secs = 1;
    config.timeouts.request_secs = 2;
    let (addr, shutdown, _updates) = common::start_gateway(config).await;

    let res = common::client()
        .get(format!("http://{}/api/slow", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "4");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upstream request timed out");

    shutdown.trigger();
}

#[tokio::test]
async fn test_reloaded_policy_applies_without_restart() {
    let upstream = common::start_echo_upstream().await;
    let mut config = config_for(upstream);
    config.rate_limit.limit = 1;
    let (addr, shutdown, updates) = common::start_gateway(config.clone()).await;
    let client = common::client();
    let url = format!("http://{}/api/items", addr);

    assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        client.get(&url).send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    config.rate_limit.limit = 10;
    updates.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-limit"], "10");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "7");

    shutdown.trigger();
}

#[tokio::test]
async fn test_peer_address_identity_ignores_forwarded_for() {
    let upstream = common::start_echo_upstream().await;
    let mut config = config_for(upstream);
    config.rate_limit.limit = 2;
    config.rate_limit.identity_source = IdentitySource::PeerAddress;
    let (addr, shutdown, _updates) = common::start_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/api/items", addr);

    let statuses = {
        let mut statuses = Vec::new();
        for spoofed in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            let res = client
                .get(&url)
                .header("x-forwarded-for", spoofed)
                .send()
                .await
                .unwrap();
            statuses.push(res.status());
        }
        statuses
    };

    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_status_reports_tracked_identities() {
    let upstream = common::start_echo_upstream().await;
    let (addr, shutdown, _updates) = common::start_gateway(config_for(upstream)).await;
    let client = common::client();

    for caller in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        client
            .get(format!("http://{}/api/ping", addr))
            .header("x-forwarded-for", caller)
            .send()
            .await
            .unwrap();
    }

    let status: Value = client
        .get(format!("http://{}/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["tracked_identities"], 3);
    assert_eq!(status["policy"]["limit"], 5);
    assert_eq!(status["policy"]["window_ms"], 60_000);

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_serving() {
    let upstream = common::start_echo_upstream().await;
    let (addr, shutdown, _updates) = common::start_gateway(config_for(upstream)).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/healthz", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let res = client
        .get(format!("http://{}/healthz", addr))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(res.is_err(), "gateway still serving after shutdown");
}
