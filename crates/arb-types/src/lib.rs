//! Shared data model for the arbitrage detection and routing core: the
//! pair/price domain types (§3), the configuration surface (§6), and the
//! semantic error-kind taxonomy (§7). Every other crate in the workspace
//! depends on this one and nothing else.

pub mod cache_value;
pub mod config;
pub mod correlation;
pub mod error;
pub mod opportunity;
pub mod pair;
pub mod price;
pub mod primitive;
pub mod stream;

pub use cache_value::CacheValue;
pub use correlation::CorrelationRecord;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use opportunity::{Leg, Opportunity, OpportunityError, OpportunityKind, PipelineTimestamps};
pub use pair::{Pair, PairSnapshot};
pub use price::{PriceUpdate, RationalPrice};
pub use primitive::{ChainId, HealthStatus, PoolId, TokenPairKey};
pub use stream::{StreamMessage, StreamPosition};

/// Current epoch time in milliseconds. The core treats this as its only
/// clock source so tests can substitute a deterministic one; production call
/// sites all go through here rather than calling `SystemTime::now()` ad hoc.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn token_pair_key_is_order_independent() {
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        assert_eq!(TokenPairKey::new(1, a, b), TokenPairKey::new(1, b, a));
    }

    proptest! {
        #[test]
        fn token_pair_key_normalizes_for_any_order(a_byte: u8, b_byte: u8) {
            let a = Address::repeat_byte(a_byte);
            let b = Address::repeat_byte(b_byte);
            prop_assert_eq!(TokenPairKey::new(7, a, b), TokenPairKey::new(7, b, a));
        }
    }
}
