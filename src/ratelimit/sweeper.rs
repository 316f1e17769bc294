//! Periodic removal of idle identity windows.
//!
//! # Responsibilities
//! - Periodically drop windows whose newest event has left the window
//! - Keep the tracked-identity gauge current

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time;

use super::limiter::RequestRateLimiter;
use super::policy::RateLimitPolicy;
use crate::observability::metrics;

pub struct WindowSweeper {
    limiter: Arc<RequestRateLimiter>,
    policy: Arc<ArcSwap<RateLimitPolicy>>,
    interval: Duration,
}

impl WindowSweeper {
    pub fn new(
        limiter: Arc<RequestRateLimiter>,
        policy: Arc<ArcSwap<RateLimitPolicy>>,
        interval: Duration,
    ) -> Self {
        Self {
            limiter,
            policy,
            interval,
        }
    }

    /// Run one sweep with the current policy's window.
    pub fn sweep_once(&self) -> usize {
        let window_ms = self.policy.load().window_ms();
        let dropped = self.limiter.sweep_idle(window_ms);
        let tracked = self.limiter.tracked_identities();

        if dropped > 0 {
            tracing::debug!(dropped = dropped, tracked = tracked, "Swept idle rate limit windows");
            metrics::record_evictions("idle", dropped);
        }
        metrics::record_tracked_identities(tracked);
        dropped
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Window sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Window sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    #[test]
    fn test_sweep_once_uses_current_policy() {
        let clock = ManualClock::new(0);
        let limiter = Arc::new(RequestRateLimiter::with_clock(Arc::new(clock.clone())));
        let policy = Arc::new(ArcSwap::from_pointee(RateLimitPolicy::new(5, 60_000).unwrap()));
        let sweeper = WindowSweeper::new(limiter.clone(), policy.clone(), Duration::from_secs(1));

        limiter.evaluate("10.0.0.1", &policy.load());
        clock.set(5_000);
        assert_eq!(sweeper.sweep_once(), 0);

        policy.store(Arc::new(RateLimitPolicy::new(5, 1_000).unwrap()));
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let limiter = Arc::new(RequestRateLimiter::new());
        let policy = Arc::new(ArcSwap::from_pointee(RateLimitPolicy::default()));
        let sweeper = WindowSweeper::new(limiter, policy, Duration::from_millis(10));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(sweeper.run(rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
