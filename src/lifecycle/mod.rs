//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP server drains, sweeper and reload loop exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{recv_shutdown, Shutdown};
pub use signals::wait_for_shutdown;
