//! Stream Client (C8), Consumer (C9), and Opportunity Publisher (C10): a
//! Redis-Streams-shaped transport with at-least-once delivery, deferred
//! per-message ack, pause/resume backpressure, and a dead-letter queue
//!.

pub mod client;
pub mod codec;
pub mod consumer;
pub mod publisher;
pub mod redis_client;

pub use client::{dlq_stream_name, PendingSummary, StreamClient, StreamInfo};
pub use codec::{decode_opportunity, encode_opportunity, CodecError};
pub use consumer::{MessageHandler, StreamConsumer};
pub use publisher::{OpportunityPublisher, OPPORTUNITIES_STREAM_MAX_LEN};
pub use redis_client::RedisStreamClient;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::{
        collections::{BTreeMap, HashMap, VecDeque},
        sync::atomic::{AtomicU64, Ordering}
    };

    use arb_types::{now_millis, StreamMessage, StreamPosition};
    use parking_lot::Mutex;

    use crate::client::{PendingSummary, StreamClient, StreamInfo};

    struct StreamState {
        entries: VecDeque<(String, BTreeMap<String, String>)>,
        groups:  HashMap<String, GroupState>
    }

    struct PendingEntry {
        delivery_count:        u32,
        last_delivered_millis: u64,
        consumer:              String
    }

    struct GroupState {
        cursor:  usize,
        pending: HashMap<String, PendingEntry>
    }

    /// In-memory [`StreamClient`] double, sufficient to drive
    /// [`crate::StreamConsumer`] and [`crate::OpportunityPublisher`] in
    /// tests without a live Redis.
    #[derive(Default)]
    pub struct InMemoryStreamStore {
        streams: Mutex<HashMap<String, StreamState>>,
        next_id: AtomicU64,
        dlq:     Mutex<Vec<(String, String, String)>>
    }

    impl InMemoryStreamStore {
        fn next_message_id(&self) -> String {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            format!("{n}-0")
        }

        pub fn dlq_entries(&self) -> Vec<(String, String, String)> {
            self.dlq.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl StreamClient for InMemoryStreamStore {
        async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> eyre::Result<String> {
            self.append_with_limit(stream, fields, u64::MAX).await
        }

        async fn append_with_limit(&self, stream: &str, fields: BTreeMap<String, String>, max_len: u64) -> eyre::Result<String> {
            let id = self.next_message_id();
            let mut streams = self.streams.lock();
            let state = streams.entry(stream.to_string()).or_insert_with(|| StreamState {
                entries: VecDeque::new(),
                groups: HashMap::new()
            });
            state.entries.push_back((id.clone(), fields));
            while state.entries.len() as u64 > max_len {
                state.entries.pop_front();
            }
            Ok(id)
        }

        async fn create_group(&self, stream: &str, group: &str, _start: StreamPosition) -> eyre::Result<()> {
            let mut streams = self.streams.lock();
            let state = streams.entry(stream.to_string()).or_insert_with(|| StreamState {
                entries: VecDeque::new(),
                groups: HashMap::new()
            });
            state.groups.entry(group.to_string()).or_insert_with(|| GroupState { cursor: 0, pending: HashMap::new() });
            Ok(())
        }

        async fn blocking_read_group(
            &self,
            stream: &str,
            group: &str,
            consumer: &str,
            batch_size: usize,
            _block_millis: u64
        ) -> eyre::Result<Vec<StreamMessage>> {
            let mut streams = self.streams.lock();
            let Some(state) = streams.get_mut(stream) else { return Ok(Vec::new()) };
            let Some(group_state) = state.groups.get_mut(group) else { return Ok(Vec::new()) };

            let mut out = Vec::new();
            while group_state.cursor < state.entries.len() && out.len() < batch_size {
                let (id, fields) = &state.entries[group_state.cursor];
                group_state.cursor += 1;
                let entry = group_state.pending.entry(id.clone()).or_insert(PendingEntry {
                    delivery_count: 0,
                    last_delivered_millis: 0,
                    consumer: consumer.to_string()
                });
                entry.delivery_count += 1;
                entry.last_delivered_millis = now_millis();
                entry.consumer = consumer.to_string();
                out.push(StreamMessage {
                    message_id: id.clone(),
                    stream_name: stream.to_string(),
                    group_name: Some(group.to_string()),
                    consumer: Some(consumer.to_string()),
                    data: fields.clone(),
                    delivery_count: entry.delivery_count
                });
            }
            Ok(out)
        }

        async fn ack(&self, stream: &str, group: &str, message_id: &str) -> eyre::Result<()> {
            let mut streams = self.streams.lock();
            if let Some(state) = streams.get_mut(stream) {
                if let Some(group_state) = state.groups.get_mut(group) {
                    group_state.pending.remove(message_id);
                }
            }
            Ok(())
        }

        async fn stream_info(&self, stream: &str) -> eyre::Result<StreamInfo> {
            let streams = self.streams.lock();
            Ok(StreamInfo { length: streams.get(stream).map(|s| s.entries.len() as u64).unwrap_or(0) })
        }

        async fn pending(&self, stream: &str, group: &str) -> eyre::Result<PendingSummary> {
            let streams = self.streams.lock();
            let Some(state) = streams.get(stream) else { return Ok(PendingSummary::default()) };
            let Some(group_state) = state.groups.get(group) else { return Ok(PendingSummary::default()) };
            Ok(PendingSummary {
                count: group_state.pending.len() as u64,
                message_ids: group_state.pending.keys().cloned().collect()
            })
        }

        async fn claim_stale(
            &self,
            stream: &str,
            group: &str,
            consumer: &str,
            min_idle_millis: u64,
            batch_size: usize
        ) -> eyre::Result<Vec<StreamMessage>> {
            let mut streams = self.streams.lock();
            let Some(state) = streams.get_mut(stream) else { return Ok(Vec::new()) };

            let now = now_millis();
            let stale_ids: Vec<String> = {
                let Some(group_state) = state.groups.get(group) else { return Ok(Vec::new()) };
                let mut ids: Vec<String> = group_state
                    .pending
                    .iter()
                    .filter(|(_, entry)| now.saturating_sub(entry.last_delivered_millis) >= min_idle_millis)
                    .map(|(id, _)| id.clone())
                    .collect();
                ids.truncate(batch_size);
                ids
            };
            if stale_ids.is_empty() {
                return Ok(Vec::new());
            }

            let mut out = Vec::new();
            for id in stale_ids {
                let Some((_, fields)) = state.entries.iter().find(|(entry_id, _)| *entry_id == id) else { continue };
                let fields = fields.clone();
                let group_state = state.groups.get_mut(group).expect("checked above");
                let entry = group_state.pending.get_mut(&id).expect("id came from this group's pending set");
                entry.delivery_count += 1;
                entry.last_delivered_millis = now;
                entry.consumer = consumer.to_string();
                out.push(StreamMessage {
                    message_id: id,
                    stream_name: stream.to_string(),
                    group_name: Some(group.to_string()),
                    consumer: Some(consumer.to_string()),
                    data: fields,
                    delivery_count: entry.delivery_count
                });
            }
            Ok(out)
        }

        async fn move_to_dlq(&self, stream: &str, group: &str, message_id: &str, reason: &str) -> eyre::Result<()> {
            self.dlq.lock().push((stream.to_string(), message_id.to_string(), reason.to_string()));
            self.ack(stream, group, message_id).await
        }
    }
}
