//! Liveness and limiter introspection endpoints. Neither is rate limited.

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde::{Deserialize, Serialize};

use crate::http::response::json_error;
use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub limit: u64,
    pub window_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LimiterStatus {
    pub version: String,
    pub tracked_identities: usize,
    pub policy: PolicyStatus,
}

pub async fn get_health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<LimiterStatus> {
    let policy = state.rate_limit.policy.load();
    Json(LimiterStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_identities: state.rate_limit.limiter.tracked_identities(),
        policy: PolicyStatus {
            limit: policy.limit(),
            window_ms: policy.window_ms(),
        },
    })
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not found")
}
