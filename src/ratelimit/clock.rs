//! Time sources for the limiter.
//!
//! Window timestamps are milliseconds since the Unix epoch. The system clock
//! anchors the wall clock once and then advances with a monotonic clock, so a
//! wall-clock step backwards can never reorder a window.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of the current instant, in epoch milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> u64;
}

/// Wall-clock anchored, monotonically advancing clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch_ms: u64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            epoch_ms,
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch_ms + self.anchor.elapsed().as_millis() as u64
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying time, so advancing one clone is visible
/// through every limiter holding another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
