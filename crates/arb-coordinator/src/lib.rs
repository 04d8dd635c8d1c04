//! Coordinator Router (C11): leader-elected, deduplicated, breaker-guarded
//! forwarding from `stream:opportunities` to `stream:execution-requests`
//!.

pub mod breaker;
pub mod duplicate;
pub mod lease;
pub mod router;

pub use breaker::{BreakerState, CircuitBreaker};
pub use duplicate::{id_key, DuplicateWindow};
pub use lease::{LeaderLease, LeaseElector, RedisLeaderLease};
pub use router::CoordinatorRouter;
