//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: status endpoints plus the gated prefix
//! - Wire up middleware (request ID, tracing, timeout, metrics, rate limit)
//! - Spawn the window sweeper and the config reload loop
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::{uri::InvalidUri, Request},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, GatekeeperConfig};
use crate::http::request::UuidRequestId;
use crate::http::status::{get_health, get_status, not_found};
use crate::http::upstream::{forward_handler, UpstreamForwarder};
use crate::lifecycle::recv_shutdown;
use crate::observability::metrics;
use crate::ratelimit::{RateLimitPolicy, RequestRateLimiter, WindowSweeper};
use crate::security::{rate_limit_middleware, RateLimitState};

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid upstream address: {0}")]
    Upstream(#[from] InvalidUri),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rate_limit: RateLimitState,
    pub upstream: Arc<UpstreamForwarder>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatekeeperConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server with a fresh limiter on the system clock.
    pub fn new(config: GatekeeperConfig) -> Result<Self, ServerError> {
        let limiter = RequestRateLimiter::new().with_capacity_limit(config.rate_limit.max_identities);
        Self::with_limiter(config, Arc::new(limiter))
    }

    /// Create a server around an existing limiter.
    pub fn with_limiter(
        config: GatekeeperConfig,
        limiter: Arc<RequestRateLimiter>,
    ) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let policy = config
            .rate_limit
            .policy()
            .map_err(|e| ConfigError::Validation(vec![e.into()]))?;

        let state = AppState {
            rate_limit: RateLimitState {
                limiter,
                policy: Arc::new(ArcSwap::from_pointee(policy)),
                identity_source: config.rate_limit.identity_source,
            },
            upstream: Arc::new(UpstreamForwarder::new(&config.upstream)?),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatekeeperConfig, state: AppState) -> Router {
        let prefix = config.rate_limit.gated_prefix.trim_end_matches('/');

        let gated = Router::new()
            .route(prefix, any(forward_handler))
            .route(&format!("{prefix}/{{*path}}"), any(forward_handler))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.rate_limit.clone(),
                rate_limit_middleware,
            ));

        Router::new()
            .route("/healthz", get(get_health))
            .route("/status", get(get_status))
            .with_state(state)
            .merge(gated)
            .fallback(not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(track_metrics))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Router with all layers, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Validated configs arriving on `config_updates` replace the active
    /// rate limit policy.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatekeeperConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.upstream.authority(),
            gated_prefix = %self.config.rate_limit.gated_prefix,
            "HTTP server starting"
        );

        let sweeper = WindowSweeper::new(
            self.state.rate_limit.limiter.clone(),
            self.state.rate_limit.policy.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        tokio::spawn(watch_config_updates(
            self.config.clone(),
            self.state.rate_limit.policy.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn watch_config_updates(
    mut current: GatekeeperConfig,
    policy: Arc<ArcSwap<RateLimitPolicy>>,
    mut updates: mpsc::UnboundedReceiver<GatekeeperConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(new_config) => {
                    apply_config_update(&current, &new_config, &policy);
                    current = new_config;
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Apply the hot-reloadable part of `new` and warn about the rest.
///
/// Returns true when the active policy changed.
pub fn apply_config_update(
    current: &GatekeeperConfig,
    new: &GatekeeperConfig,
    policy: &ArcSwap<RateLimitPolicy>,
) -> bool {
    for field in restart_only_changes(current, new) {
        tracing::warn!(field = field, "Config change requires a restart to take effect");
    }

    let new_policy = match new.rate_limit.policy() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Ignoring reloaded rate limit policy");
            return false;
        }
    };

    if **policy.load() == new_policy {
        return false;
    }

    policy.store(Arc::new(new_policy));
    tracing::info!(
        limit = new_policy.limit(),
        window_ms = new_policy.window_ms(),
        "Rate limit policy reloaded"
    );
    true
}

fn restart_only_changes(current: &GatekeeperConfig, new: &GatekeeperConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.listener.bind_address != new.listener.bind_address {
        changed.push("listener.bind_address");
    }
    if current.upstream.address != new.upstream.address {
        changed.push("upstream.address");
    }
    if current.upstream.timeout_secs != new.upstream.timeout_secs {
        changed.push("upstream.timeout_secs");
    }
    if current.timeouts.request_secs != new.timeouts.request_secs {
        changed.push("timeouts.request_secs");
    }
    if current.rate_limit.identity_source != new.rate_limit.identity_source {
        changed.push("rate_limit.identity_source");
    }
    if current.rate_limit.gated_prefix != new.rate_limit.gated_prefix {
        changed.push("rate_limit.gated_prefix");
    }
    if current.rate_limit.max_identities != new.rate_limit.max_identities {
        changed.push("rate_limit.max_identities");
    }
    if current.rate_limit.sweep_interval_secs != new.rate_limit.sweep_interval_secs {
        changed.push("rate_limit.sweep_interval_secs");
    }
    changed
}
