//! Predictive Warmer (C7): debounced, correlation-driven L2 -> L1
//! promotion, with pluggable Warming Strategies.

pub mod strategy;
pub mod warmer;

pub use strategy::{AdaptiveStrategy, ThresholdStrategy, TimeBasedStrategy, TopNStrategy, WarmingContext, WarmingSelection, WarmingStrategy};
pub use warmer::{cache_key, PredictiveWarmer, WarmerConfig, WarmingResult};
