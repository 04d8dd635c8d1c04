use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::primitive::ChainId;

/// One hop of a candidate trade path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub dex_id:    u32,
    pub token0:    Address,
    pub token1:    Address,
    pub amount_in:  Option<U256>,
    pub amount_out: Option<U256>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OpportunityKind {
    TwoPair,
    Triangular,
    MultiLeg,
    CrossChain
}

/// Timestamps stamped onto an opportunity as it crosses pipeline stages.
/// `coordinator_seen` / `execution_received` start unset and are filled in by
/// downstream consumers, not by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTimestamps {
    pub ws_received:        u64,
    pub published:          u64,
    pub coordinator_seen:   Option<u64>,
    pub execution_received: Option<u64>
}

/// A candidate profitable trade path, normalized across detection strategies
/// so the stream transport and coordinator never need to know which scan
/// produced it.
///
/// Invariant (enforced at construction, see [`Opportunity::new`]):
/// `net_bps > 0` and `expiry_millis > pipeline.published`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Deterministic hash of `{chain, legs, block}` — recomputing it from the
    /// same inputs always yields the same id, which the duplicate window and
    /// DLQ both rely on.
    pub id:           [u8; 32],
    pub kind:         OpportunityKind,
    pub chain_id:     ChainId,
    pub legs:         Vec<Leg>,
    pub gross_bps:    i64,
    pub net_bps:      i64,
    /// Confidence score in `[0, 1]`.
    pub confidence:   f64,
    pub expiry_millis: u64,
    pub pipeline:     PipelineTimestamps,
    /// Producer id, e.g. `"detector:eth:two_pair"`.
    pub source:       String
}

#[derive(Debug, thiserror::Error)]
pub enum OpportunityError {
    #[error("net_bps must be > 0, got {0}")]
    NonPositiveNetBps(i64),
    #[error("expiry_millis ({expiry}) must be after published ({published})")]
    ExpiryBeforePublish { expiry: u64, published: u64 },
    #[error("confidence must be in [0, 1], got {0}")]
    ConfidenceOutOfRange(f64)
}

impl Opportunity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: [u8; 32],
        kind: OpportunityKind,
        chain_id: ChainId,
        legs: Vec<Leg>,
        gross_bps: i64,
        net_bps: i64,
        confidence: f64,
        expiry_millis: u64,
        pipeline: PipelineTimestamps,
        source: String
    ) -> Result<Self, OpportunityError> {
        if net_bps <= 0 {
            return Err(OpportunityError::NonPositiveNetBps(net_bps));
        }
        if expiry_millis <= pipeline.published {
            return Err(OpportunityError::ExpiryBeforePublish {
                expiry:    expiry_millis,
                published: pipeline.published
            });
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(OpportunityError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self { id, kind, chain_id, legs, gross_bps, net_bps, confidence, expiry_millis, pipeline, source })
    }
}
