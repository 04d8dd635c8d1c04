use std::collections::BTreeMap;

use arb_types::{StreamMessage, StreamPosition};

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamInfo {
    pub length: u64
}

#[derive(Debug, Clone, Default)]
pub struct PendingSummary {
    pub count: u64,
    pub message_ids: Vec<String>
}

/// The Stream Client (C8): a Redis-Streams-shaped transport abstraction.
/// Real deployments back this with Redis; tests substitute an in-memory
/// double (`testing-tools`).
#[async_trait::async_trait]
pub trait StreamClient: Send + Sync {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> eyre::Result<String>;

    /// Approximate trim so writes stay O(1) (`~maxLen`).
    async fn append_with_limit(&self, stream: &str, fields: BTreeMap<String, String>, max_len: u64) -> eyre::Result<String>;

    /// Idempotent: "already exists" is not an error.
    async fn create_group(&self, stream: &str, group: &str, start: StreamPosition) -> eyre::Result<()>;

    async fn blocking_read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
        block_millis: u64
    ) -> eyre::Result<Vec<StreamMessage>>;

    async fn ack(&self, stream: &str, group: &str, message_id: &str) -> eyre::Result<()>;

    /// Defaults (length 0) if the stream doesn't yet exist.
    async fn stream_info(&self, stream: &str) -> eyre::Result<StreamInfo>;

    /// Defaults (empty) if the stream or group doesn't yet exist.
    async fn pending(&self, stream: &str, group: &str) -> eyre::Result<PendingSummary>;

    /// Reclaims pending entries idle for at least `min_idle_millis`,
    /// reassigning them to `consumer` and bumping their delivery count.
    /// Mirrors Redis's XCLAIM/XAUTOCLAIM. Returns the reclaimed messages, up
    /// to `batch_size`; a message crash-orphaned by its original consumer
    /// surfaces here instead of through `blocking_read_group`.
    async fn claim_stale(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_millis: u64,
        batch_size: usize
    ) -> eyre::Result<Vec<StreamMessage>>;

    /// Atomic: appends a DLQ record then acks the original.
    async fn move_to_dlq(&self, stream: &str, group: &str, message_id: &str, reason: &str) -> eyre::Result<()>;
}

pub fn dlq_stream_name(stream: &str) -> String {
    format!("{stream}:dlq")
}
