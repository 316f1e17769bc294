//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on a gated route:
//!     → identity.rs (forwarded-for or peer address)
//!     → rate_limit.rs (evaluate, 429 or pass through with quota headers)
//!     → upstream forwarder
//! ```

pub mod identity;
pub mod rate_limit;

pub use identity::client_identity;
pub use rate_limit::{rate_limit_middleware, RateLimitState};
