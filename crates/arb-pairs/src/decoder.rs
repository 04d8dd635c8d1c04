use alloy_primitives::U256;
use arb_metrics::ChainMetrics;
use arb_types::{PoolId, PriceUpdate, RationalPrice};

use crate::repository::PairRepository;

/// A reserve-update log has exactly two 256-bit big-integer fields, in the
/// order `(reserve0, reserve1)`
#[derive(Debug, Clone)]
pub struct RawReserveLog {
    pub pool_id:      PoolId,
    pub data:         Vec<u8>,
    pub block_number: u64
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("reserve-update payload must be exactly 64 bytes, got {0}")]
    WrongLength(usize)
}

fn decode_reserves(data: &[u8]) -> Result<(U256, U256), DecodeError> {
    if data.len() != 64 {
        return Err(DecodeError::WrongLength(data.len()));
    }
    let reserve0 = U256::from_be_slice(&data[0..32]);
    let reserve1 = U256::from_be_slice(&data[32..64]);
    Ok((reserve0, reserve1))
}

/// Parses raw reserve-update logs and applies them to a [`PairRepository`],
/// producing [`PriceUpdate`]s for the Detector (C4) to consume.
///
/// Decode errors are counted and the message dropped *before* touching the
/// repository, so a malformed frame never inflates a pair's activity
/// statistics.
pub struct EventDecoder {
    metrics: ChainMetrics
}

impl EventDecoder {
    pub fn new(chain: &'static str) -> Self {
        Self { metrics: ChainMetrics::new(chain) }
    }

    /// `applyReserveUpdate(decoded) -> PriceUpdate?`.
    pub fn apply_reserve_update(
        &self,
        repo: &PairRepository,
        log: &RawReserveLog,
        now_millis: u64
    ) -> Option<PriceUpdate> {
        let (reserve0, reserve1) = match decode_reserves(&log.data) {
            Ok(r) => r,
            Err(_) => {
                self.metrics.parse_error();
                return None;
            }
        };

        let snapshot = repo.apply_reserve_update(log.pool_id, reserve0, reserve1, log.block_number, now_millis)?;
        let mid_price = RationalPrice::from_reserves(reserve0, reserve1)?;

        Some(PriceUpdate {
            pool: snapshot.pool_id(),
            mid_price,
            reserve0,
            reserve1,
            block_number: snapshot.block_number,
            source_received_millis: now_millis,
            published_millis: None
        })
    }
}
