//! Sliding-window request limiter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::policy::{RateLimitDecision, RateLimitPolicy};
use super::window::RateWindow;
use crate::observability::metrics;

/// Bucket shared by every caller whose identity could not be derived.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Fraction of the capacity freed by one eviction pass (1/N).
const EVICTION_BATCH_DIVISOR: usize = 10;

/// Tracks per-identity event timestamps and decides admit/reject.
///
/// The identity map is sharded; the entry for one identity stays locked for
/// the whole prune-record-count sequence, so concurrent evaluations for the
/// same identity never lose updates.
#[derive(Debug)]
pub struct RequestRateLimiter {
    windows: DashMap<String, RateWindow>,
    clock: Arc<dyn Clock>,
    /// Soft cap on tracked identities. `None` means unbounded.
    max_identities: Option<usize>,
    /// Held by the one caller currently scanning for eviction victims.
    evicting: AtomicBool,
    eviction_passes: AtomicUsize,
}

impl RequestRateLimiter {
    /// Create an unbounded limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
            max_identities: None,
            evicting: AtomicBool::new(false),
            eviction_passes: AtomicUsize::new(0),
        }
    }

    /// Bound the number of tracked identities. Zero leaves the map unbounded.
    ///
    /// When a new identity arrives at capacity, a tenth of the capacity is
    /// freed in one pass, taking identities with the oldest most recent event
    /// first. One full scan is therefore shared by the next batch of inserts.
    pub fn with_capacity_limit(mut self, max_identities: usize) -> Self {
        self.max_identities = (max_identities > 0).then_some(max_identities);
        self
    }

    /// Evaluate one event for `identity` at the current instant.
    pub fn evaluate(&self, identity: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.evaluate_at(identity, policy, self.clock.now_ms())
    }

    /// Evaluate one event for `identity` at `now_ms`.
    ///
    /// The event is recorded before the admission check, so a rejected event
    /// still occupies a slot until it ages out of the window.
    pub fn evaluate_at(
        &self,
        identity: &str,
        policy: &RateLimitPolicy,
        now_ms: u64,
    ) -> RateLimitDecision {
        let identity = normalize_identity(identity);
        let window_ms = policy.window_ms();

        let mut window = match self.windows.get_mut(identity) {
            Some(window) => window,
            None => {
                self.make_room();
                debug!(identity = %identity, "Tracking new rate limit identity");
                self.windows.entry(identity.to_owned()).or_default()
            }
        };

        window.prune(now_ms, window_ms);
        window.record(now_ms);

        let count = window.len() as u64;
        let decision = RateLimitDecision {
            success: count <= policy.limit(),
            limit: policy.limit(),
            remaining: policy.limit().saturating_sub(count),
            reset_seconds: window.reset_seconds(now_ms, window_ms),
        };

        trace!(
            identity = %identity,
            count = count,
            success = decision.success,
            remaining = decision.remaining,
            "Evaluated rate limit"
        );

        decision
    }

    /// Number of identities currently holding a window.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Drop every window whose newest event is older than `window_ms`.
    ///
    /// Returns the number of identities removed.
    pub fn sweep_idle(&self, window_ms: u64) -> usize {
        let now_ms = self.clock.now_ms();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| !window.is_idle(now_ms, window_ms));
        before.saturating_sub(self.windows.len())
    }

    /// Number of capacity eviction passes run so far.
    pub fn eviction_passes(&self) -> usize {
        self.eviction_passes.load(Ordering::Relaxed)
    }

    /// Free a batch of least recently used identities once the map is full.
    ///
    /// Only one caller scans at a time; others insert past the cap meanwhile.
    /// Must not be called while holding an entry guard on `windows`.
    fn make_room(&self) {
        let Some(max) = self.max_identities else {
            return;
        };
        if self.windows.len() < max {
            return;
        }
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let keep = max - eviction_batch(max);
        let mut by_recency: Vec<(u64, String)> = self
            .windows
            .iter()
            .map(|entry| (entry.value().newest().unwrap_or(0), entry.key().clone()))
            .collect();

        let excess = by_recency.len().saturating_sub(keep);
        if excess > 0 {
            by_recency.select_nth_unstable_by_key(excess - 1, |(newest, _)| *newest);
            for (_, key) in by_recency.drain(..excess) {
                self.windows.remove(&key);
            }
        }

        self.evicting.store(false, Ordering::Release);
        let passes = self.eviction_passes.fetch_add(1, Ordering::Relaxed) + 1;

        if excess > 0 {
            debug!(
                evicted = excess,
                max_identities = max,
                passes = passes,
                "Evicted least recently used identities"
            );
            metrics::record_evictions("capacity", excess);
        }
    }
}

fn eviction_batch(max: usize) -> usize {
    (max / EVICTION_BATCH_DIVISOR).max(1)
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim surrounding whitespace from an identity.
///
/// `"a "` and `"a"` therefore share a bucket, and an identity that is empty
/// after trimming maps onto the shared `unknown` bucket.
pub fn normalize_identity(identity: &str) -> &str {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTITY
    } else {
        trimmed
    }
}
