use crate::primitive::PoolId;

/// Co-occurrence record between two pairs' update streams.
///
/// Invariants: `source != correlated`, `co_occurrences >= 0`,
/// `last_seen_millis <= now` at the time of observation, `score in [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationRecord {
    pub source:          PoolId,
    pub correlated:      PoolId,
    pub co_occurrences:  u64,
    pub last_seen_millis: u64,
    pub score:           f64
}
