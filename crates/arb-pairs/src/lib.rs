//! Pair Repository (C2) and Event Decoder (C3): the owned store of every
//! tracked liquidity pool, and the pure decode step that turns a raw
//! reserve-update log into a [`arb_types::PriceUpdate`] while mutating the
//! owning pair in place.

pub mod decoder;
pub mod repository;

pub use decoder::{DecodeError, EventDecoder, RawReserveLog};
pub use repository::PairRepository;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use alloy_primitives::{Address, U256};
    use arb_types::{ChainId, Pair};

    pub fn make_pair(chain_id: ChainId, pool: Address, token0: Address, token1: Address, fee_bps: u32) -> Pair {
        Pair::new(chain_id, pool, 1, token0, token1, fee_bps, U256::from(1_000_000u64), U256::from(1_000_000u64), 1, 0)
    }
}
