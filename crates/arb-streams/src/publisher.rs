use std::sync::Arc;

use arb_metrics::StreamMetrics;
use arb_types::{now_millis, Opportunity};
use tracing::warn;

use crate::{client::StreamClient, codec::encode_opportunity};

/// Opportunities stream retention bound ("~10 000 entries / 24h").
pub const OPPORTUNITIES_STREAM_MAX_LEN: u64 = 10_000;

/// Opportunity Publisher (C10): enrich and append, fire-and-forget.
pub struct OpportunityPublisher {
    stream:  String,
    client:  Arc<dyn StreamClient>,
    source:  String,
    metrics: StreamMetrics
}

impl OpportunityPublisher {
    pub fn new(stream: impl Into<String>, client: Arc<dyn StreamClient>, source: impl Into<String>) -> Self {
        Self { stream: stream.into(), client, source: source.into(), metrics: StreamMetrics::default() }
    }

    /// `publish(opportunity) -> bool`. Never retried at this layer —
    /// reliability is the downstream consumer groups' job.
    pub async fn publish(&self, mut opportunity: Opportunity) -> bool {
        opportunity.source = self.source.clone();
        opportunity.pipeline.published = now_millis();

        let fields = encode_opportunity(&opportunity);
        match self.client.append_with_limit(&self.stream, fields, OPPORTUNITIES_STREAM_MAX_LEN).await {
            Ok(_) => true,
            Err(err) => {
                warn!(stream = %self.stream, error = %err, "opportunity publish failed");
                self.metrics.publish_failed(&self.stream);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::atomic::AtomicBool};

    use alloy_primitives::{address, U256};
    use arb_types::{Leg, OpportunityKind, PipelineTimestamps, StreamPosition};

    use super::*;
    use crate::client::{PendingSummary, StreamInfo};

    struct ToggleClient {
        fail: AtomicBool
    }

    #[async_trait::async_trait]
    impl StreamClient for ToggleClient {
        async fn append(&self, _stream: &str, _fields: BTreeMap<String, String>) -> eyre::Result<String> {
            Ok("0-1".to_string())
        }

        async fn append_with_limit(&self, _stream: &str, _fields: BTreeMap<String, String>, _max_len: u64) -> eyre::Result<String> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                Err(eyre::eyre!("connection reset"))
            } else {
                Ok("0-1".to_string())
            }
        }

        async fn create_group(&self, _stream: &str, _group: &str, _start: StreamPosition) -> eyre::Result<()> {
            Ok(())
        }

        async fn blocking_read_group(
            &self,
            _stream: &str,
            _group: &str,
            _consumer: &str,
            _batch_size: usize,
            _block_millis: u64
        ) -> eyre::Result<Vec<arb_types::StreamMessage>> {
            Ok(Vec::new())
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
        ) -> eyre::Result<Vec<arb_types::StreamMessage>> {
            Ok(Vec::new())
        }

        async fn move_to_dlq(&self, _stream: &str, _group: &str, _message_id: &str, _reason: &str) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn fixture() -> Opportunity {
        let legs = vec![Leg {
            dex_id: 1,
            token0: address!("0000000000000000000000000000000000000001"),
            token1: address!("0000000000000000000000000000000000000002"),
            amount_in: Some(U256::from(1u64)),
            amount_out: None
        }];
        Opportunity::new(
            [1u8; 32],
            OpportunityKind::TwoPair,
            1,
            legs,
            50,
            40,
            0.8,
            2_000,
            PipelineTimestamps { ws_received: 500, published: 0, ..Default::default() },
            "placeholder".to_string()
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publish_succeeds_and_stamps_source() {
        let client = Arc::new(ToggleClient { fail: AtomicBool::new(false) });
        let publisher = OpportunityPublisher::new("stream:opportunities", client, "detector:ethereum:two_pair");
        assert!(publisher.publish(fixture()).await);
    }

    #[tokio::test]
    async fn publish_failure_is_absorbed_as_false() {
        let client = Arc::new(ToggleClient { fail: AtomicBool::new(true) });
        let publisher = OpportunityPublisher::new("stream:opportunities", client, "detector:ethereum:two_pair");
        assert!(!publisher.publish(fixture()).await);
    }
}
