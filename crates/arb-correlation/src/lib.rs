//! Correlation Tracker (C6): co-occurrence scoring with exponential
//! recency decay, sharded by source pair.

pub mod tracker;

pub use tracker::{CorrelationConfig, CorrelationStats, CorrelationTracker};
