use std::collections::{BTreeMap, HashMap};

use arb_metrics::StreamMetrics;
use arb_types::{StreamMessage, StreamPosition};
use redis::{
    streams::{StreamClaimReply, StreamMaxlen, StreamPendingCountReply, StreamReadOptions, StreamReadReply},
    AsyncCommands
};

use crate::client::{dlq_stream_name, PendingSummary, StreamClient, StreamInfo};

/// Cap on how many pending entries a single `XPENDING` extended-form scan
/// inspects. `pending()`'s reported count always comes from the plain
/// XPENDING summary; this only bounds how many ids it can enumerate and how
/// many `claim_stale` can consider per call.
const PENDING_SCAN_LIMIT: usize = 1_000;

pub struct RedisStreamClient {
    manager: redis::aio::ConnectionManager,
    metrics: StreamMetrics
}

impl RedisStreamClient {
    pub async fn connect(url: &str) -> eyre::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager, metrics: StreamMetrics::default() })
    }

    fn conn(&self) -> redis::aio::ConnectionManager {
        self.manager.clone()
    }
}

fn fields_to_pairs(fields: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

#[async_trait::async_trait]
impl StreamClient for RedisStreamClient {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> eyre::Result<String> {
        let mut conn = self.conn();
        let pairs = fields_to_pairs(&fields);
        let id: String = match conn.xadd(stream, "*", &pairs).await {
            Ok(id) => id,
            Err(err) => {
                self.metrics.publish_failed(stream);
                return Err(err.into());
            }
        };
        Ok(id)
    }

    async fn append_with_limit(&self, stream: &str, fields: BTreeMap<String, String>, max_len: u64) -> eyre::Result<String> {
        let mut conn = self.conn();
        let pairs = fields_to_pairs(&fields);
        let id: String = match conn.xadd_maxlen(stream, StreamMaxlen::Approx(max_len as usize), "*", &pairs).await {
            Ok(id) => id,
            Err(err) => {
                self.metrics.publish_failed(stream);
                return Err(err.into());
            }
        };
        Ok(id)
    }

    async fn create_group(&self, stream: &str, group: &str, start: StreamPosition) -> eyre::Result<()> {
        let mut conn = self.conn();
        let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, start.as_wire()).await;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => Err(err.into())
        }
    }

    async fn blocking_read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
        block_millis: u64
    ) -> eyre::Result<Vec<StreamMessage>> {
        let mut conn = self.conn();
        let opts = StreamReadOptions::default().group(group, consumer).count(batch_size).block(block_millis as usize);
        let reply: StreamReadReply = conn.xread_options(&[stream], &[">"], &opts).await?;

        let mut messages = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let mut data = BTreeMap::new();
                for (field, value) in entry.map {
                    if let redis::Value::BulkString(bytes) = value {
                        data.insert(field, String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                messages.push(StreamMessage {
                    message_id: entry.id,
                    stream_name: stream.to_string(),
                    group_name: Some(group.to_string()),
                    consumer: Some(consumer.to_string()),
                    data,
                    delivery_count: 1
                });
            }
        }
        Ok(messages)
    }

    async fn ack(&self, stream: &str, group: &str, message_id: &str) -> eyre::Result<()> {
        let mut conn = self.conn();
        let _: i64 = conn.xack(stream, group, &[message_id]).await?;
        self.metrics.acked(stream);
        Ok(())
    }

    async fn stream_info(&self, stream: &str) -> eyre::Result<StreamInfo> {
        let mut conn = self.conn();
        let len: redis::RedisResult<u64> = conn.xlen(stream).await;
        Ok(StreamInfo { length: len.unwrap_or(0) })
    }

    async fn pending(&self, stream: &str, group: &str) -> eyre::Result<PendingSummary> {
        let mut conn = self.conn();
        let reply: redis::RedisResult<redis::streams::StreamPendingReply> = conn.xpending(stream, group).await;
        let count = match reply {
            Ok(redis::streams::StreamPendingReply::Data(data)) => data.count as u64,
            _ => 0
        };
        if count == 0 {
            return Ok(PendingSummary::default());
        }

        let detailed: redis::RedisResult<StreamPendingCountReply> =
            conn.xpending_count(stream, group, "-", "+", PENDING_SCAN_LIMIT).await;
        let message_ids = detailed.map(|reply| reply.ids.into_iter().map(|entry| entry.id).collect()).unwrap_or_default();

        Ok(PendingSummary { count, message_ids })
    }

    async fn claim_stale(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_millis: u64,
        batch_size: usize
    ) -> eyre::Result<Vec<StreamMessage>> {
        let mut conn = self.conn();
        let detailed: StreamPendingCountReply = conn.xpending_count(stream, group, "-", "+", PENDING_SCAN_LIMIT).await?;

        let mut prior_delivery_counts: HashMap<String, usize> = HashMap::new();
        let mut stale_ids = Vec::new();
        for entry in detailed.ids {
            if entry.time_since_delivered as u64 >= min_idle_millis {
                prior_delivery_counts.insert(entry.id.clone(), entry.times_delivered);
                stale_ids.push(entry.id);
            }
            if stale_ids.len() >= batch_size {
                break;
            }
        }
        if stale_ids.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = conn.xclaim(stream, group, consumer, min_idle_millis as i64, &stale_ids).await?;

        let mut messages = Vec::new();
        for entry in claimed.ids {
            let mut data = BTreeMap::new();
            for (field, value) in entry.map {
                if let redis::Value::BulkString(bytes) = value {
                    data.insert(field, String::from_utf8_lossy(&bytes).into_owned());
                }
            }
            let delivery_count = prior_delivery_counts.get(&entry.id).copied().unwrap_or(0) as u32 + 1;
            messages.push(StreamMessage {
                message_id: entry.id,
                stream_name: stream.to_string(),
                group_name: Some(group.to_string()),
                consumer: Some(consumer.to_string()),
                data,
                delivery_count
            });
        }
        self.metrics.claimed(stream, messages.len());
        Ok(messages)
    }

    async fn move_to_dlq(&self, stream: &str, group: &str, message_id: &str, reason: &str) -> eyre::Result<()> {
        let mut conn = self.conn();
        let dlq = dlq_stream_name(stream);
        let mut fields = BTreeMap::new();
        fields.insert("original_stream".to_string(), stream.to_string());
        fields.insert("original_message_id".to_string(), message_id.to_string());
        fields.insert("reason".to_string(), reason.to_string());
        let pairs = fields_to_pairs(&fields);

        let result: redis::RedisResult<()> = redis::pipe()
            .atomic()
            .xadd(&dlq, "*", &pairs)
            .xack(stream, group, &[message_id])
            .query_async(&mut conn)
            .await;
        result?;
        self.metrics.moved_to_dlq(stream, reason_label(reason));
        Ok(())
    }
}

fn reason_label(reason: &str) -> &'static str {
    match reason {
        r if r.contains("timeout") => "timeout",
        r if r.contains("handler") => "handler_error",
        _ => "other"
    }
}
