use std::{collections::HashSet, sync::Arc};

use arb_metrics::CoordinatorMetrics;
use arb_streams::{decode_opportunity, encode_opportunity, MessageHandler, StreamClient};
use arb_types::{now_millis, ChainId, StreamMessage};
use tracing::warn;

use crate::{
    breaker::CircuitBreaker,
    duplicate::{id_key, DuplicateWindow},
    lease::LeaseElector
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValidationFailure {
    UnknownChain,
    Expired,
    ProfitOutOfRange
}

/// Business validation: `netBps` in the tight trading
/// range, `chainId` known to this deployment, and not already expired. This
/// is distinct from the detector's wide decoder-bug sanity clamp — see
/// `DESIGN.md`.
const NET_BPS_BUSINESS_RANGE: (i64, i64) = (-10_000, 10_000);

/// Coordinator Router (C11). Wired as the [`MessageHandler`] of a
/// `StreamConsumer` over `stream:opportunities`; every branch acks (or
/// DLQs-then-acks) the source message so redelivery never depends on this
/// handler's Result.
pub struct CoordinatorRouter {
    execution_stream: String,
    known_chains:     HashSet<ChainId>,
    lease:            Arc<LeaseElector>,
    duplicate_window: DuplicateWindow,
    breaker:          CircuitBreaker,
    metrics:          CoordinatorMetrics
}

impl CoordinatorRouter {
    pub fn new(
        execution_stream: impl Into<String>,
        known_chains: HashSet<ChainId>,
        lease: Arc<LeaseElector>,
        duplicate_window: DuplicateWindow,
        breaker: CircuitBreaker
    ) -> Self {
        Self {
            execution_stream: execution_stream.into(),
            known_chains,
            lease,
            duplicate_window,
            breaker,
            metrics: CoordinatorMetrics
        }
    }

    /// Rehydrates the duplicate window from in-flight pending entries before
    /// the consumer starts reading new messages, so a restart mid-window
    /// does not reforward what the previous process already forwarded
    ///.
    pub async fn bootstrap(&self, client: &dyn StreamClient, stream: &str, group: &str) -> eyre::Result<()> {
        let pending = client.pending(stream, group).await?;
        let now = now_millis();
        for message_id in pending.message_ids {
            self.duplicate_window.seed(message_id, now);
        }
        Ok(())
    }

    fn validate_business(&self, opp: &arb_types::Opportunity, now_millis: u64) -> Result<(), ValidationFailure> {
        if !self.known_chains.contains(&opp.chain_id) {
            return Err(ValidationFailure::UnknownChain);
        }
        if opp.expiry_millis <= now_millis {
            return Err(ValidationFailure::Expired);
        }
        if opp.net_bps < NET_BPS_BUSINESS_RANGE.0 || opp.net_bps > NET_BPS_BUSINESS_RANGE.1 {
            return Err(ValidationFailure::ProfitOutOfRange);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageHandler for CoordinatorRouter {
    async fn handle(&self, msg: &StreamMessage, client: &dyn StreamClient) -> eyre::Result<()> {
        let group = msg.group_name.as_deref().unwrap_or("");
        let now = now_millis();

        // 1. Leader check.
        if !self.lease.is_leader() {
            client.ack(&msg.stream_name, group, &msg.message_id).await?;
            return Ok(());
        }

        // 2. Validation (structural then business).
        let opportunity = match decode_opportunity(&msg.data) {
            Ok(opp) => opp,
            Err(err) => {
                client
                    .move_to_dlq(&msg.stream_name, group, &msg.message_id, &format!("structural: {err}"))
                    .await?;
                self.metrics.opportunities_dropped("invalid_structural");
                return Ok(());
            }
        };

        if let Err(failure) = self.validate_business(&opportunity, now) {
            let reason = match failure {
                ValidationFailure::UnknownChain => "unknown_chain",
                ValidationFailure::Expired => "expired",
                ValidationFailure::ProfitOutOfRange => "profit_out_of_range"
            };
            client.move_to_dlq(&msg.stream_name, group, &msg.message_id, reason).await?;
            self.metrics.opportunities_dropped(reason);
            return Ok(());
        }

        // 3. Duplicate window.
        if self.duplicate_window.check_and_insert(id_key(opportunity.id), now) {
            client.ack(&msg.stream_name, group, &msg.message_id).await?;
            self.metrics.duplicate_dropped();
            return Ok(());
        }

        // 4. Circuit breaker.
        if self.breaker.is_open(now) {
            client.ack(&msg.stream_name, group, &msg.message_id).await?;
            self.metrics.opportunities_dropped("breaker_open");
            return Ok(());
        }

        // 5. Forward, recording breaker success/failure.
        let mut forwarded = opportunity;
        forwarded.pipeline.coordinator_seen = Some(now);
        let fields = encode_opportunity(&forwarded);
        match client.append(&self.execution_stream, fields).await {
            Ok(_) => {
                self.breaker.record_success(now);
                self.metrics.forwarded();
            }
            Err(err) => {
                warn!(stream = %self.execution_stream, error = %err, "forward to execution-requests failed");
                self.breaker.record_failure(now);
            }
        }

        // 6. Ack regardless of forward outcome.
        client.ack(&msg.stream_name, group, &msg.message_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, U256};
    use arb_streams::test_utils::InMemoryStreamStore;
    use arb_types::{Leg, Opportunity, OpportunityKind, PipelineTimestamps, StreamPosition};

    use super::*;
    use crate::lease::LeaderLease;

    struct AlwaysLeader;
    #[async_trait::async_trait]
    impl LeaderLease for AlwaysLeader {
        async fn try_acquire_or_renew(&self, _holder_id: &str, _ttl_millis: u64) -> eyre::Result<bool> {
            Ok(true)
        }

        async fn release(&self, _holder_id: &str) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn fixture_fields(net_bps: i64, expiry_millis: u64, chain_id: ChainId) -> std::collections::BTreeMap<String, String> {
        let legs = vec![Leg {
            dex_id: 1,
            token0: address!("0000000000000000000000000000000000000001"),
            token1: address!("0000000000000000000000000000000000000002"),
            amount_in: Some(U256::from(1u64)),
            amount_out: None
        }];
        let opp = Opportunity::new(
            [9u8; 32],
            OpportunityKind::TwoPair,
            chain_id,
            legs,
            50,
            net_bps,
            0.8,
            expiry_millis,
            PipelineTimestamps { ws_received: 1, published: 2, ..Default::default() },
            "detector:ethereum:two_pair".to_string()
        )
        .unwrap();
        encode_opportunity(&opp)
    }

    async fn leader_elector() -> Arc<LeaseElector> {
        let elector = Arc::new(LeaseElector::new(
            Arc::new(AlwaysLeader),
            "node-a",
            arb_types::config::LeaderLeaseConfig { leader_lock_ttl_millis: 10_000, base_retry_delay_millis: 50 }
        ));
        elector.start();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        elector
    }

    #[tokio::test]
    async fn forwards_a_valid_opportunity_and_acks() {
        let client = Arc::new(InMemoryStreamStore::default());
        client.create_group("stream:opportunities", "coordinator", StreamPosition::Beginning).await.unwrap();
        let fields = fixture_fields(40, now_millis() + 60_000, 1);
        client.append("stream:opportunities", fields).await.unwrap();

        let mut known = HashSet::new();
        known.insert(1u64);
        let router = CoordinatorRouter::new(
            "stream:execution-requests",
            known,
            leader_elector().await,
            DuplicateWindow::new(5_000),
            CircuitBreaker::new(arb_types::config::BreakerConfig::default())
        );

        let messages = client
            .blocking_read_group("stream:opportunities", "coordinator", "c1", 10, 10)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        router.handle(&messages[0], client.as_ref()).await.unwrap();

        let execution_info = client.stream_info("stream:execution-requests").await.unwrap();
        assert_eq!(execution_info.length, 1);
        let pending = client.pending("stream:opportunities", "coordinator").await.unwrap();
        assert_eq!(pending.count, 0);
    }

    #[tokio::test]
    async fn out_of_range_profit_goes_to_dlq() {
        let client = Arc::new(InMemoryStreamStore::default());
        client.create_group("stream:opportunities", "coordinator", StreamPosition::Beginning).await.unwrap();
        let fields = fixture_fields(20_000, now_millis() + 60_000, 1);
        client.append("stream:opportunities", fields).await.unwrap();

        let mut known = HashSet::new();
        known.insert(1u64);
        let router = CoordinatorRouter::new(
            "stream:execution-requests",
            known,
            leader_elector().await,
            DuplicateWindow::new(5_000),
            CircuitBreaker::new(arb_types::config::BreakerConfig::default())
        );

        let messages =
            client.blocking_read_group("stream:opportunities", "coordinator", "c1", 10, 10).await.unwrap();
        router.handle(&messages[0], client.as_ref()).await.unwrap();

        assert_eq!(client.dlq_entries().len(), 1);
        let execution_info = client.stream_info("stream:execution-requests").await.unwrap();
        assert_eq!(execution_info.length, 0);
    }

    #[tokio::test]
    async fn second_delivery_of_same_opportunity_is_deduped() {
        let client = Arc::new(InMemoryStreamStore::default());
        client.create_group("stream:opportunities", "coordinator", StreamPosition::Beginning).await.unwrap();
        let fields = fixture_fields(40, now_millis() + 60_000, 1);
        client.append("stream:opportunities", fields.clone()).await.unwrap();
        client.append("stream:opportunities", fields).await.unwrap();

        let mut known = HashSet::new();
        known.insert(1u64);
        let router = CoordinatorRouter::new(
            "stream:execution-requests",
            known,
            leader_elector().await,
            DuplicateWindow::new(5_000),
            CircuitBreaker::new(arb_types::config::BreakerConfig::default())
        );

        let messages =
            client.blocking_read_group("stream:opportunities", "coordinator", "c1", 10, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        for msg in &messages {
            router.handle(msg, client.as_ref()).await.unwrap();
        }

        let execution_info = client.stream_info("stream:execution-requests").await.unwrap();
        assert_eq!(execution_info.length, 1);
    }
}
