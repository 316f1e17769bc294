//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every problem is reported, not just the first.

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::ratelimit::PolicyError;

/// Paths served outside the gated prefix.
const RESERVED_PATHS: [&str; 2] = ["/healthz", "/status"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rate_limit: {0}")]
    Policy(#[from] PolicyError),

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.address: invalid authority '{0}'")]
    InvalidUpstream(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("rate_limit.gated_prefix must start with '/', name at least one segment and contain no '{{' or '}}', got '{0}'")]
    InvalidPrefix(String),

    #[error("rate_limit.gated_prefix '{0}' overlaps the built-in {1} endpoint")]
    ReservedPrefix(String, &'static str),

    #[error("upstream.timeout_secs ({upstream}) must be less than timeouts.request_secs ({request})")]
    UpstreamTimeoutTooLong { upstream: u64, request: u64 },

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.rate_limit.policy() {
        errors.push(ValidationError::Policy(e));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidUpstream(config.upstream.address.clone()));
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("upstream.timeout_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("rate_limit.sweep_interval_secs"));
    }
    // The request timeout wraps the upstream call; at equal lengths it fires
    // first and the caller gets a bare 408 instead of the gateway's 504.
    if config.timeouts.request_secs > 0
        && config.upstream.timeout_secs >= config.timeouts.request_secs
    {
        errors.push(ValidationError::UpstreamTimeoutTooLong {
            upstream: config.upstream.timeout_secs,
            request: config.timeouts.request_secs,
        });
    }

    if let Err(e) = validate_prefix(&config.rate_limit.gated_prefix) {
        errors.push(e);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the gated prefix the same way the router will mount it.
fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    let mounted = prefix.trim_end_matches('/');
    if !prefix.starts_with('/') || mounted.is_empty() || mounted.contains(['{', '}']) {
        return Err(ValidationError::InvalidPrefix(prefix.to_string()));
    }

    for reserved in RESERVED_PATHS {
        let nested = mounted
            .strip_prefix(reserved)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if nested {
            return Err(ValidationError::ReservedPrefix(prefix.to_string(), reserved));
        }
    }
    Ok(())
}
