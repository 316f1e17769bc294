//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → HTTP server swaps the active rate limit policy
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Only the rate limit policy is hot-reloadable; listener and upstream
//!   changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GatekeeperConfig, IdentitySource, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
