//! Connection Supervisor: keeps one active subscription per
//! chain alive, reconnecting with backoff/jitter and rotating across
//! health-scored fallback endpoints. The upstream RPC/subscription itself is
//! an external collaborator ([`UpstreamEventSource`]) — wiring a concrete
//! EVM or Solana client is out of scope here.

pub mod backoff;
pub mod health;
pub mod source;
pub mod supervisor;

pub use health::{EndpointHealth, EndpointStats, HealthScorer};
pub use source::{BoxLogStream, DecodedLog, EventFilters, SubscriptionError, UpstreamEventSource};
pub use supervisor::{staleness_tier_millis, ConnectionSupervisor, RotateReason, SupervisorEvent};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::{pin::Pin, sync::Mutex};

    use futures::Stream;

    use crate::source::{BoxLogStream, DecodedLog, EventFilters, LogStreamItem, SubscriptionError, UpstreamEventSource};

    /// Replays a fixed, caller-supplied sequence of items then ends. Used by
    /// tests to drive [`crate::ConnectionSupervisor`] deterministically.
    pub struct ScriptedUpstream {
        scripts: Mutex<Vec<Vec<LogStreamItem>>>
    }

    impl ScriptedUpstream {
        /// Each call to `connect` pops the next script off the front; once
        /// exhausted, `connect` returns an error.
        pub fn new(scripts: Vec<Vec<LogStreamItem>>) -> Self {
            Self { scripts: Mutex::new(scripts) }
        }
    }

    #[async_trait::async_trait]
    impl UpstreamEventSource for ScriptedUpstream {
        async fn connect(&self, _endpoint: &str, _filters: &EventFilters) -> eyre::Result<BoxLogStream> {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                return Err(eyre::eyre!("scripted upstream exhausted"));
            }
            let script = scripts.remove(0);
            Ok(Box::pin(futures::stream::iter(script)) as Pin<Box<dyn Stream<Item = LogStreamItem> + Send>>)
        }
    }

    pub fn decoded_log(block_number: u64) -> DecodedLog {
        DecodedLog {
            address: alloy_primitives::Address::ZERO,
            topics: vec![],
            data: alloy_primitives::Bytes::from_static(&[0u8; 64]),
            block_number,
            transaction_hash: alloy_primitives::B256::ZERO,
            arrival_millis: arb_types::now_millis()
        }
    }

    pub fn rate_limited() -> LogStreamItem {
        Err(SubscriptionError::classify(Some(429), "rate limited"))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::StreamExt;

    use super::*;
    use crate::test_utils::{decoded_log, ScriptedUpstream};

    #[tokio::test]
    async fn forwards_decoded_logs_and_detects_gap() {
        let upstream = Arc::new(ScriptedUpstream::new(vec![vec![
            Ok(decoded_log(100)),
            Ok(decoded_log(105))
        ]]));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            "ethereum",
            vec!["wss://primary".to_string()],
            5_000,
            1,
            1 << 20,
            upstream
        ));

        let mut rx = supervisor.subscribe(EventFilters::default()).await;

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, SupervisorEvent::Log(log) if log.block_number == 100));

        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(second, SupervisorEvent::DataGap { previous_block: 100, observed_block: 105, .. }));
    }

    #[tokio::test]
    async fn request_rotate_excludes_current_endpoint() {
        let upstream = Arc::new(ScriptedUpstream::new(vec![vec![Ok(decoded_log(1))], vec![Ok(decoded_log(2))]]));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            "ethereum",
            vec!["wss://primary".to_string()],
            5_000,
            100,
            1 << 20,
            upstream
        ));

        let mut rx = supervisor.subscribe(EventFilters::default()).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;

        supervisor.request_rotate(RotateReason::Manual);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let health = supervisor.get_health();
        assert_eq!(health.len(), 1);
    }

    #[test]
    fn staleness_tier_and_health_are_exported() {
        assert_eq!(staleness_tier_millis(1_000), 5_000);
    }
}
