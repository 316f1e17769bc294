//! HTTP layer.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → /healthz, /status → status.rs
//!     → gated prefix → security::rate_limit → upstream.rs
//!     → response.rs (JSON errors, X-RateLimit-* headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod status;
pub mod upstream;

pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::{
    ErrorBody, TOO_MANY_REQUESTS_MESSAGE, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
pub use server::{AppState, HttpServer, ServerError};
