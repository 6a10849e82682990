//! Rate limiting logic and state management.

mod clock;
mod entry;
mod key;
mod limiter;
mod policy;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::RateWindowEntry;
pub use key::{compose_key, resolve_client, UNKNOWN_CLIENT};
pub use limiter::{Decision, RateLimiter};
pub use policy::{Policy, PolicyTable, AUTH_SEND, EVENT_CREATE, LOCATION};
pub use sweeper::{SweeperHandle, DEFAULT_SWEEP_INTERVAL};
