//! Rate limit policy and decision types.

use serde::Serialize;
use thiserror::Error;

/// Rejected policy values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("rate limit must be at least 1")]
    ZeroLimit,
    #[error("rate limit window must be at least 1ms")]
    ZeroWindow,
}

/// Immutable `(limit, window)` pair governing one rate-limited call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    limit: u64,
    window_ms: u64,
}

impl RateLimitPolicy {
    /// Create a policy admitting `limit` events per `window_ms` milliseconds.
    pub fn new(limit: u64, window_ms: u64) -> Result<Self, PolicyError> {
        if limit == 0 {
            return Err(PolicyError::ZeroLimit);
        }
        if window_ms == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        Ok(Self { limit, window_ms })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

impl Default for RateLimitPolicy {
    /// 5 requests per 60 seconds.
    fn default() -> Self {
        Self {
            limit: 5,
            window_ms: 60_000,
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether the event was admitted.
    pub success: bool,
    /// Echo of the policy limit.
    pub limit: u64,
    /// Slots left in the current window, never negative.
    pub remaining: u64,
    /// Whole seconds until the oldest event in the window expires.
    pub reset_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_values() {
        assert_eq!(RateLimitPolicy::new(0, 1000), Err(PolicyError::ZeroLimit));
        assert_eq!(RateLimitPolicy::new(5, 0), Err(PolicyError::ZeroWindow));
    }

    #[test]
    fn test_policy_accepts_minimum_values() {
        let policy = RateLimitPolicy::new(1, 1).unwrap();
        assert_eq!(policy.limit(), 1);
        assert_eq!(policy.window_ms(), 1);
    }

    #[test]
    fn test_default_policy() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit(), 5);
        assert_eq!(policy.window_ms(), 60_000);
    }
}
