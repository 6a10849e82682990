//! Core rate limiter implementation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::entry::RateWindowEntry;
use super::policy::Policy;
use crate::error::Result;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests still admissible in the current window
    pub remaining: u64,
    /// End of the current window, in milliseconds since the Unix epoch
    pub reset_at: i64,
}

impl Decision {
    /// Whole seconds until the window resets, rounded up.
    ///
    /// A denial always asks for at least one second, even when `now_ms` has
    /// already reached `reset_at`.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = self.reset_at.saturating_sub(now_ms).max(0) as u64;
        let secs = wait_ms.div_ceil(1000);
        if self.allowed {
            secs
        } else {
            secs.max(1)
        }
    }
}

/// A fixed-window rate limiter keyed by arbitrary strings.
///
/// Each key gets a counter that starts on its first request and resets
/// `window_seconds` later. A burst of up to twice the limit can therefore be
/// admitted across a window boundary.
///
/// The limit is enforced per process; separate instances do not share
/// counts. The entry map is sharded and each check holds the shard's write
/// lock for its read-modify-write, so concurrent checks for one key never
/// lose an update.
pub struct RateLimiter {
    /// Window state indexed by key
    entries: DashMap<String, RateWindowEntry>,
    /// Source of the current time
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new rate limiter on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Current time according to this limiter's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Count a request for `key` and decide whether it is admitted.
    ///
    /// A denial is a normal `Ok` outcome. The only error is an invalid
    /// policy (zero limit or zero window).
    pub fn check(&self, key: &str, policy: &Policy) -> Result<Decision> {
        policy.validate()?;
        let now = self.clock.now_ms();

        let decision = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = RateWindowEntry::open(now, policy);
                    Self::admit_first(entry, policy)
                } else {
                    let count = entry.record_hit();
                    Decision {
                        allowed: count <= policy.limit,
                        remaining: policy.limit.saturating_sub(count),
                        reset_at: entry.reset_at,
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let entry = RateWindowEntry::open(now, policy);
                vacant.insert(entry);
                Self::admit_first(&entry, policy)
            }
        };

        trace!(
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            reset_at = decision.reset_at,
            "Checked rate limit"
        );

        if !decision.allowed {
            debug!(key = %key, limit = policy.limit, "Rate limit exceeded");
        }

        Ok(decision)
    }

    fn admit_first(entry: &RateWindowEntry, policy: &Policy) -> Decision {
        Decision {
            allowed: true,
            remaining: policy.limit - 1,
            reset_at: entry.reset_at,
        }
    }

    /// Remove every entry whose window has ended.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            if expired {
                removed += 1;
            }
            !expired
        });

        debug!(
            removed = removed,
            remaining = self.entries.len(),
            "Swept expired rate limit entries"
        );
        removed
    }

    /// Get the window state for a key, expired or not.
    pub fn entry(&self, key: &str) -> Option<RateWindowEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
