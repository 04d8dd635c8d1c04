//! In-memory doubles and data builders shared across crate test suites —
//! one `test_utils` module per producer crate, composed here for
//! cross-crate, end-to-end scenarios.

pub mod fixtures;

pub use arb_cache::test_utils::InMemoryStore;
pub use arb_chain::test_utils::{decoded_log, rate_limited, ScriptedUpstream};
pub use arb_pairs::test_utils::make_pair;
pub use arb_streams::test_utils::InMemoryStreamStore;
