//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::ratelimit::{PolicyError, RateLimitPolicy};

/// Root configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Rate limiting policy and identity derivation.
    pub rate_limit: RateLimitConfig,

    /// Upstream API that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Where the caller identity is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// First entry of `X-Forwarded-For`. Only meaningful behind a trusted
    /// reverse proxy; clients can set it freely otherwise.
    #[default]
    ForwardedFor,
    /// TCP peer address of the connection.
    PeerAddress,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u64,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// How the caller identity is derived.
    pub identity_source: IdentitySource,

    /// Maximum tracked identities (0 = unbounded).
    pub max_identities: usize,

    /// Interval between idle-window sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Path prefix whose requests pass through the limiter.
    pub gated_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            window_ms: 60_000,
            identity_source: IdentitySource::ForwardedFor,
            max_identities: 100_000,
            sweep_interval_secs: 30,
            gated_prefix: "/api".to_string(),
        }
    }
}

impl RateLimitConfig {
    /// Build the policy described by this section.
    pub fn policy(&self) -> Result<RateLimitPolicy, PolicyError> {
        RateLimitPolicy::new(self.limit, self.window_ms)
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Timeout for one upstream call in seconds. Must be shorter than
    /// `timeouts.request_secs` so the gateway answers with its own 504.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            timeout_secs: 25,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
