use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};

use arb_metrics::StreamMetrics;
use arb_types::StreamMessage;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::client::StreamClient;

/// How often the consumer loop checks for stale pending entries to reclaim,
/// relative to `claim_age_millis`. Scanning every cycle would hammer
/// `XPENDING` under low traffic; this keeps the scan interval proportional
/// to how aggressively entries are expected to go stale.
const CLAIM_SCAN_DIVISOR: u64 = 4;

/// Decides its own ack policy — the consumer loop never acks on the
/// handler's behalf ("auto-ack is false by default").
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &StreamMessage, client: &dyn StreamClient) -> eyre::Result<()>;
}

/// Stream Consumer (C9): a dedicated long-lived task per stream/group,
/// pausable for backpressure.
pub struct StreamConsumer {
    stream:          String,
    group:           String,
    consumer:        String,
    batch_size:      usize,
    block_millis:    u64,
    claim_age_millis: u64,
    client:          Arc<dyn StreamClient>,
    handler:         Arc<dyn MessageHandler>,
    metrics:         StreamMetrics,
    paused:          Arc<AtomicBool>,
    stopped:         Arc<AtomicBool>,
    resume_signal:   Arc<Notify>
}

impl StreamConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        batch_size: usize,
        block_millis: u64,
        claim_age_millis: u64,
        client: Arc<dyn StreamClient>,
        handler: Arc<dyn MessageHandler>
    ) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            batch_size,
            block_millis,
            claim_age_millis,
            client,
            handler,
            metrics: StreamMetrics::default(),
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            resume_signal: Arc::new(Notify::new())
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.metrics.paused(&self.stream);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.metrics.resumed(&self.stream);
        self.resume_signal.notify_waiters();
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.resume_signal.notify_waiters();
    }

    /// `start()`: spawns the consumer loop in the background.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    async fn run(&self) {
        let scan_interval_millis = (self.claim_age_millis / CLAIM_SCAN_DIVISOR).max(1);
        let mut last_claim_scan = arb_types::now_millis();

        while !self.stopped.load(Ordering::SeqCst) {
            if self.paused.load(Ordering::SeqCst) {
                self.resume_signal.notified().await;
                continue;
            }

            let now = arb_types::now_millis();
            if now.saturating_sub(last_claim_scan) >= scan_interval_millis {
                last_claim_scan = now;
                self.reclaim_stale().await;
            }

            let messages = match self
                .client
                .blocking_read_group(&self.stream, &self.group, &self.consumer, self.batch_size, self.block_millis)
                .await
            {
                Ok(msgs) => msgs,
                Err(err) => {
                    error!(stream = %self.stream, error = %err, "blockingReadGroup failed");
                    continue;
                }
            };

            for msg in messages {
                self.handle_one(msg).await;
            }
        }
    }

    /// Reclaims entries left pending since before `claim_age_millis` ago —
    /// crash-orphaned by whichever consumer last read them — and runs them
    /// through the same handler path as a fresh delivery.
    async fn reclaim_stale(&self) {
        let reclaimed = match self
            .client
            .claim_stale(&self.stream, &self.group, &self.consumer, self.claim_age_millis, self.batch_size)
            .await
        {
            Ok(msgs) => msgs,
            Err(err) => {
                warn!(stream = %self.stream, error = %err, "claimStale failed");
                return;
            }
        };

        for msg in reclaimed {
            debug!(stream = %self.stream, message_id = %msg.message_id, delivery_count = msg.delivery_count, "reclaimed stale pending entry");
            self.handle_one(msg).await;
        }
    }

    async fn handle_one(&self, msg: StreamMessage) {
        if let Err(err) = self.handler.handle(&msg, self.client.as_ref()).await {
            error!(stream = %self.stream, message_id = %msg.message_id, error = %err, "handler failed, not acking");
            self.metrics.handler_error(&self.stream);
        } else {
            debug!(stream = %self.stream, message_id = %msg.message_id, "handled");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::atomic::AtomicUsize};

    use arb_types::StreamPosition;

    use super::*;
    use crate::client::{PendingSummary, StreamInfo};

    struct CountingHandler {
        acked: AtomicUsize
    }

    #[async_trait::async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, msg: &StreamMessage, client: &dyn StreamClient) -> eyre::Result<()> {
            client.ack(&msg.stream_name, msg.group_name.as_deref().unwrap_or(""), &msg.message_id).await?;
            self.acked.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    struct OneShotClient {
        delivered: std::sync::atomic::AtomicBool
    }

    #[async_trait::async_trait]
    impl StreamClient for OneShotClient {
        async fn append(&self, _stream: &str, _fields: BTreeMap<String, String>) -> eyre::Result<String> {
            Ok("0-1".to_string())
        }

        async fn append_with_limit(&self, _stream: &str, _fields: BTreeMap<String, String>, _max_len: u64) -> eyre::Result<String> {
            Ok("0-1".to_string())
        }

        async fn create_group(&self, _stream: &str, _group: &str, _start: StreamPosition) -> eyre::Result<()> {
            Ok(())
        }

        async fn blocking_read_group(
            &self,
            stream: &str,
            group: &str,
            consumer: &str,
            _batch_size: usize,
            _block_millis: u64
        ) -> eyre::Result<Vec<StreamMessage>> {
            if self.delivered.swap(true, std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                return Ok(Vec::new());
            }
            Ok(vec![StreamMessage {
                message_id: "1-1".to_string(),
                stream_name: stream.to_string(),
                group_name: Some(group.to_string()),
                consumer: Some(consumer.to_string()),
                data: BTreeMap::new(),
                delivery_count: 1
            }])
        }

        async fn ack(&self, _stream: &str, _group: &str, _message_id: &str) -> eyre::Result<()> {
            Ok(())
        }

        async fn stream_info(&self, _stream: &str) -> eyre::Result<StreamInfo> {
            Ok(StreamInfo::default())
        }

        async fn pending(&self, _stream: &str, _group: &str) -> eyre::Result<PendingSummary> {
            Ok(PendingSummary::default())
        }

        async fn claim_stale(
            &self,
            _stream: &str,
            _group: &str,
            _consumer: &str,
            _min_idle_millis: u64,
            _batch_size: usize
        ) -> eyre::Result<Vec<StreamMessage>> {
            Ok(Vec::new())
        }

        async fn move_to_dlq(&self, _stream: &str, _group: &str, _message_id: &str, _reason: &str) -> eyre::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn consumer_handles_then_pauses_cleanly() {
        let client = Arc::new(OneShotClient { delivered: std::sync::atomic::AtomicBool::new(false) });
        let handler = Arc::new(CountingHandler { acked: AtomicUsize::new(0) });
        let consumer = Arc::new(StreamConsumer::new("s", "g", "c", 10, 10, 60_000, client, handler.clone()));

        let task = consumer.start();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        consumer.stop();
        let _ = tokio::time::timeout(std::time::Duration::from_millis(100), task).await;

        assert_eq!(handler.acked.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pause_blocks_until_resume() {
        let client = Arc::new(OneShotClient { delivered: std::sync::atomic::AtomicBool::new(false) });
        let handler = Arc::new(CountingHandler { acked: AtomicUsize::new(0) });
        let consumer = Arc::new(StreamConsumer::new("s", "g", "c", 10, 10, 60_000, client, handler));
        consumer.pause();
        assert!(consumer.is_paused());
        consumer.resume();
        assert!(!consumer.is_paused());
        consumer.stop();
    }
}
