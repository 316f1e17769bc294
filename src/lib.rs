//! Sliding-window request rate limiting gateway.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod ratelimit;
pub mod security;

pub use config::GatekeeperConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use ratelimit::{RateLimitDecision, RateLimitPolicy, RequestRateLimiter};
