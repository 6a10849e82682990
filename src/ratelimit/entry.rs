//! Per-key window state.

use super::policy::Policy;

/// Admission state for one key during one active window.
///
/// The window ends at `reset_at`; from that instant on the entry is expired
/// and must be replaced rather than incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowEntry {
    /// Requests seen in the current window, including denied ones
    pub count: u64,
    /// End of the window, in milliseconds since the Unix epoch
    pub reset_at: i64,
}

impl RateWindowEntry {
    /// Open a new window at `now_ms` holding the first request.
    pub fn open(now_ms: i64, policy: &Policy) -> Self {
        Self {
            count: 1,
            reset_at: now_ms.saturating_add(policy.window_ms()),
        }
    }

    /// Whether the window has ended at `now_ms`.
    ///
    /// Any `now_ms` before `reset_at` counts as inside the window, which also
    /// covers a wall clock that stepped backwards.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.reset_at <= now_ms
    }

    /// Count one more request. Returns the new count.
    pub fn record_hit(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }
}
