//! Request rate limiting.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → security::identity (derive caller identity)
//!     → limiter.rs (prune window, record event, decide)
//!     → RateLimitDecision → X-RateLimit-* headers / 429
//!
//! Background:
//!     sweeper.rs drops idle windows on an interval
//! ```
//!
//! # Design Decisions
//! - Sliding window over raw timestamps, not fixed buckets
//! - Events are recorded before the admission check; rejected calls
//!   still occupy a slot
//! - State is process-local; N instances enforce N independent limits

pub mod clock;
mod limiter;
mod policy;
pub mod sweeper;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{normalize_identity, RequestRateLimiter, UNKNOWN_IDENTITY};
pub use policy::{PolicyError, RateLimitDecision, RateLimitPolicy};
pub use sweeper::WindowSweeper;
pub use window::RateWindow;
