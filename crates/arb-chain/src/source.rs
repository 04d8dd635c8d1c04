use std::pin::Pin;

use alloy_primitives::{Address, Bytes, B256};
use futures::Stream;

/// Topics this chain should subscribe to: reserve-update and swap log
/// signatures. Left opaque to the core — the adapter translating an EVM/
/// Solana subscription into [`DecodedLog`]s owns the concrete topic list.
#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub topics: Vec<B256>
}

/// One decoded on-chain log, tagged with the time it arrived at the
/// supervisor.
#[derive(Debug, Clone)]
pub struct DecodedLog {
    pub address:          Address,
    pub topics:           Vec<B256>,
    pub data:             Bytes,
    pub block_number:     u64,
    pub transaction_hash: B256,
    pub arrival_millis:   u64
}

/// Classification of an error surfaced by the upstream subscription: a
/// code or message classifiable as rate-limiting, capacity, or something
/// else entirely.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("over capacity: {0}")]
    OverCapacity(String),
    #[error("subscription error: {0}")]
    Other(String)
}

impl SubscriptionError {
    /// Classifies a raw error code/message the way an upstream provider
    /// reports it. Real adapters map provider-specific codes here; this is
    /// a reasonable default pattern-based classifier.
    pub fn classify(code: Option<i64>, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        match code {
            Some(429) => SubscriptionError::RateLimited(message.to_string()),
            Some(503) => SubscriptionError::OverCapacity(message.to_string()),
            _ if lower.contains("rate limit") || lower.contains("too many requests") => {
                SubscriptionError::RateLimited(message.to_string())
            }
            _ if lower.contains("capacity") || lower.contains("overloaded") => {
                SubscriptionError::OverCapacity(message.to_string())
            }
            _ => SubscriptionError::Other(message.to_string())
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SubscriptionError::RateLimited(_))
    }
}

pub type LogStreamItem = Result<DecodedLog, SubscriptionError>;
pub type BoxLogStream = Pin<Box<dyn Stream<Item = LogStreamItem> + Send>>;

/// The external collaborator the Connection Supervisor drives. Concrete
/// implementations wrap an actual EVM/Solana RPC subscription; that wrapping
/// is explicitly out of scope for this core — only this interface
/// is specified.
#[async_trait::async_trait]
pub trait UpstreamEventSource: Send + Sync {
    /// Opens one subscription against `endpoint`. The returned stream is
    /// lazy, infinite, and non-restartable: once it ends (or errors out
    /// terminally) the caller must call `connect` again against a (possibly
    /// different) endpoint.
    async fn connect(&self, endpoint: &str, filters: &EventFilters) -> eyre::Result<BoxLogStream>;
}
