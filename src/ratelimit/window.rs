//! Per-identity sliding window.

use std::collections::VecDeque;

/// Event timestamps (epoch ms) for one identity, oldest first.
#[derive(Debug, Default, Clone)]
pub struct RateWindow {
    timestamps: VecDeque<u64>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every event at or before `now - window_ms`.
    ///
    /// An event exactly `window_ms` old is expired.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) {
        while let Some(&oldest) = self.timestamps.front() {
            if oldest.saturating_add(window_ms) > now_ms {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Record an event. Callers pass non-decreasing instants.
    pub fn record(&mut self, now_ms: u64) {
        self.timestamps.push_back(now_ms);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.front().copied()
    }

    pub fn newest(&self) -> Option<u64> {
        self.timestamps.back().copied()
    }

    /// Whole seconds until the oldest event leaves the window, floored.
    pub fn reset_seconds(&self, now_ms: u64, window_ms: u64) -> u64 {
        self.oldest()
            .map(|oldest| oldest.saturating_add(window_ms).saturating_sub(now_ms) / 1000)
            .unwrap_or(0)
    }

    /// True when the newest event has left the window.
    pub fn is_idle(&self, now_ms: u64, window_ms: u64) -> bool {
        self.newest()
            .map_or(true, |newest| newest.saturating_add(window_ms) <= now_ms)
    }
}
