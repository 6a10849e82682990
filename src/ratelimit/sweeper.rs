//! Background reclamation of expired rate limit entries.
//!
//! Lazy expiry inside `check` keeps decisions correct on its own; the sweeper
//! only bounds memory held by keys that are never checked again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;
use crate::error::{Result, TurnstileError};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running sweeper task.
///
/// Dropping the handle also ends the task at its next wake-up.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
    }

    /// Whether the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl RateLimiter {
    /// Spawn a task that sweeps this limiter every `every`.
    ///
    /// The first sweep runs one full interval after spawning. Must be called
    /// from within a tokio runtime. A zero interval is rejected.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> Result<SweeperHandle> {
        if every.is_zero() {
            return Err(TurnstileError::Config(
                "sweep interval must be positive".to_string(),
            ));
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let limiter = Arc::clone(self);
        let first_sweep = Instant::now() + every;

        info!(interval = ?every, "Starting rate limit sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(first_sweep, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.sweep();
                    }
                    changed = shutdown_rx.changed() => {
                        // An error means the handle was dropped
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Rate limit sweeper stopped");
        });

        Ok(SweeperHandle { shutdown, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::ratelimit::policy::Policy;

    const POLICY: Policy = Policy::new(5, 1);

    /// Let woken tasks run on the current-thread test runtime.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(RateLimiter::with_clock(clock.clone()));

        for i in 0..4 {
            limiter.check(&format!("location:10.0.0.{}", i), &POLICY).unwrap();
        }
        clock.advance(Duration::from_secs(2));

        let handle = limiter.spawn_sweeper(Duration::from_secs(60)).unwrap();

        // Nothing happens before the first interval elapses
        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(limiter.len(), 4);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(limiter.is_empty());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_live_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(RateLimiter::with_clock(clock.clone()));
        limiter.check("auth-send:10.0.0.1", &POLICY).unwrap();

        let handle = limiter.spawn_sweeper(Duration::from_secs(60)).unwrap();
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(60)).await;
            settle().await;
        }

        assert_eq!(limiter.len(), 1);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let limiter = Arc::new(RateLimiter::new());
        let handle = limiter.spawn_sweeper(Duration::from_secs(3600)).unwrap();
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("sweeper did not stop");

        // The task no longer holds a reference to the limiter
        assert_eq!(Arc::strong_count(&limiter), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_ends_task() {
        let limiter = Arc::new(RateLimiter::new());
        drop(limiter.spawn_sweeper(Duration::from_secs(3600)).unwrap());

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while Arc::strong_count(&limiter) > 1 {
            assert!(std::time::Instant::now() < deadline, "sweeper outlived its handle");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let limiter = Arc::new(RateLimiter::new());

        let result = limiter.spawn_sweeper(Duration::ZERO);
        assert!(matches!(result, Err(TurnstileError::Config(_))));
        assert_eq!(Arc::strong_count(&limiter), 1);
    }
}
