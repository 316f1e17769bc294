//! Rate limiting middleware.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::config::IdentitySource;
use crate::http::response::{apply_rate_limit_headers, too_many_requests};
use crate::observability::metrics;
use crate::ratelimit::{RateLimitPolicy, RequestRateLimiter};
use crate::security::identity::client_identity;

/// State shared by every gated route.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RequestRateLimiter>,
    /// Swapped on config reload.
    pub policy: Arc<ArcSwap<RateLimitPolicy>>,
    pub identity_source: IdentitySource,
}

/// Evaluate the caller against the active policy.
///
/// Rejected callers get a 429 with the quota headers; admitted requests run
/// the inner handler and get the same headers added to its response.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = client_identity(state.identity_source, &request);
    let policy = **state.policy.load();

    let decision = state.limiter.evaluate(&identity, &policy);
    metrics::record_decision(decision.success);

    if !decision.success {
        tracing::warn!(
            client = %identity,
            limit = decision.limit,
            reset_seconds = decision.reset_seconds,
            "Rate limit exceeded"
        );
        return too_many_requests(&decision);
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}
