use std::{sync::Arc, time::Duration};

use arb_metrics::ChainMetrics;
use arb_types::now_millis;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    backoff::{rate_limit_cooldown_millis, reconnect_delay_millis},
    health::{EndpointHealth, EndpointStats, HealthScorer},
    source::{BoxLogStream, DecodedLog, EventFilters, SubscriptionError, UpstreamEventSource}
};

/// Sustained traffic on one endpoint for this long resets its attempt
/// counter ("reset on a sustained healthy window, >=30s").
const SUSTAINED_HEALTHY_WINDOW_MILLIS: u64 = 30_000;

/// Hint passed to [`ConnectionSupervisor::request_rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateReason {
    StaleConnection,
    DataGap,
    Manual
}

/// Emitted alongside decoded logs on the supervisor's output channel when the
/// supervisor itself observes staleness or a block gap.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Log(DecodedLog),
    StaleConnection { endpoint: String },
    DataGap { endpoint: String, previous_block: u64, observed_block: u64 }
}

struct EndpointState {
    stats: EndpointStats,
    consecutive_rate_limits: u32
}

/// Keeps exactly one active subscription alive per chain, reconnecting with
/// backoff/jitter and rotating across health-scored endpoints.
pub struct ConnectionSupervisor {
    chain: &'static str,
    staleness_threshold_millis: u64,
    block_gap_tolerance: u64,
    max_message_bytes: usize,
    scorer: HealthScorer,
    endpoints: RwLock<Vec<EndpointState>>,
    source: Arc<dyn UpstreamEventSource>,
    metrics: ChainMetrics,
    rotate_tx: mpsc::UnboundedSender<RotateReason>,
    rotate_rx: RwLock<Option<mpsc::UnboundedReceiver<RotateReason>>>
}

impl ConnectionSupervisor {
    pub fn new(
        chain: &'static str,
        endpoints: Vec<String>,
        staleness_threshold_millis: u64,
        block_gap_tolerance: u64,
        max_message_bytes: usize,
        source: Arc<dyn UpstreamEventSource>
    ) -> Self {
        let (rotate_tx, rotate_rx) = mpsc::unbounded_channel();
        Self {
            chain,
            staleness_threshold_millis,
            block_gap_tolerance,
            max_message_bytes,
            scorer: HealthScorer::default(),
            endpoints: RwLock::new(
                endpoints
                    .into_iter()
                    .map(|url| EndpointState { stats: EndpointStats::new(url), consecutive_rate_limits: 0 })
                    .collect()
            ),
            source,
            metrics: ChainMetrics::new(chain),
            rotate_tx,
            rotate_rx: RwLock::new(Some(rotate_rx))
        }
    }

    /// `requestRotate(reason)` — a hint to try the next-best
    /// provider. Non-blocking; dropped silently if no loop is listening.
    pub fn request_rotate(&self, reason: RotateReason) {
        let _ = self.rotate_tx.send(reason);
    }

    /// `getHealth()`.
    pub fn get_health(&self) -> Vec<EndpointHealth> {
        self.endpoints.read().iter().map(|e| self.scorer.snapshot(&e.stats)).collect()
    }

    fn best_endpoint_url(&self, now: u64) -> Option<String> {
        let endpoints = self.endpoints.read();
        self.scorer.best_available(endpoints.iter().map(|e| &e.stats), now).map(|s| s.url.clone())
    }

    fn mark_excluded(&self, url: &str, cooldown_millis: u64, now: u64) {
        let mut endpoints = self.endpoints.write();
        if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
            e.stats.excluded_until_millis = Some(now + cooldown_millis);
            e.stats.attempt_count += 1;
        }
    }

    fn record_success(&self, url: &str, latency_ms: f64) {
        let mut endpoints = self.endpoints.write();
        if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
            e.stats.latency_p95_ms = latency_ms;
            e.stats.success_rate = (e.stats.success_rate * 0.9 + 0.1).min(1.0);
        }
    }

    fn record_failure(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
            e.stats.success_rate *= 0.9;
        }
    }

    fn reset_attempts_if_sustained(&self, url: &str, connected_since: u64, now: u64) {
        if now.saturating_sub(connected_since) >= SUSTAINED_HEALTHY_WINDOW_MILLIS {
            let mut endpoints = self.endpoints.write();
            if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
                e.stats.attempt_count = 0;
            }
        }
    }

    fn attempt_count(&self, url: &str) -> u32 {
        self.endpoints.read().iter().find(|e| e.stats.url == url).map(|e| e.stats.attempt_count).unwrap_or(0)
    }

    fn note_rate_limit(&self, url: &str) -> u32 {
        let mut endpoints = self.endpoints.write();
        if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
            e.consecutive_rate_limits += 1;
            e.consecutive_rate_limits
        } else {
            1
        }
    }

    fn reset_rate_limits(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(e) = endpoints.iter_mut().find(|e| e.stats.url == url) {
            e.consecutive_rate_limits = 0;
        }
    }

    /// `subscribe(filters)` — runs the reconnection loop forever, forwarding
    /// decoded logs and supervisor-observed events on the returned channel.
    /// The hot path never awaits anything except the next upstream item.
    pub async fn subscribe(self: Arc<Self>, filters: EventFilters) -> mpsc::UnboundedReceiver<SupervisorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rotate_rx = self.rotate_rx.write().take().expect("subscribe called once");
        tokio::spawn(async move {
            let mut last_block: Option<u64> = None;
            loop {
                let now = now_millis();
                let Some(url) = self.best_endpoint_url(now) else {
                    warn!(chain = self.chain, "all endpoints excluded, retrying least-bad shortly");
                    tokio::time::sleep(Duration::from_millis(reconnect_delay_millis(0))).await;
                    continue;
                };

                self.metrics.reconnect_attempted();
                let stream = match self.source.connect(&url, &filters).await {
                    Ok(s) => s,
                    Err(err) => {
                        warn!(chain = self.chain, endpoint = %url, error = %err, "connect failed");
                        let attempt = self.attempt_count(&url);
                        self.mark_excluded(&url, 0, now);
                        tokio::time::sleep(Duration::from_millis(reconnect_delay_millis(attempt))).await;
                        continue;
                    }
                };

                info!(chain = self.chain, endpoint = %url, "subscription established");
                let connected_since = now_millis();
                if self.run_stream(stream, &tx, &url, connected_since, &mut last_block, &mut rotate_rx).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    async fn run_stream(
        &self,
        mut stream: BoxLogStream,
        tx: &mpsc::UnboundedSender<SupervisorEvent>,
        url: &str,
        connected_since: u64,
        last_block: &mut Option<u64>,
        rotate_rx: &mut mpsc::UnboundedReceiver<RotateReason>
    ) -> Result<(), ()> {
        loop {
            let staleness_timeout = Duration::from_millis(self.staleness_threshold_millis);
            tokio::select! {
                biased;

                reason = rotate_rx.recv() => {
                    if reason.is_some() {
                        self.metrics.endpoint_rotated();
                        self.mark_excluded(url, 0, now_millis());
                        return Ok(());
                    }
                    return Err(());
                }

                item = tokio::time::timeout(staleness_timeout, stream.next()) => {
                    match item {
                        Err(_elapsed) => {
                            self.metrics.stale_connection();
                            let _ = tx.send(SupervisorEvent::StaleConnection { endpoint: url.to_string() });
                            self.mark_excluded(url, 0, now_millis());
                            return Ok(());
                        }
                        Ok(None) => {
                            debug!(chain = self.chain, endpoint = url, "subscription ended");
                            return Ok(());
                        }
                        Ok(Some(Ok(log))) => {
                            if log.data.len() > self.max_message_bytes {
                                warn!(chain = self.chain, endpoint = url, "message exceeds maxMessageSize, closing");
                                return Ok(());
                            }
                            self.record_success(url, 0.0);
                            self.reset_attempts_if_sustained(url, connected_since, now_millis());
                            self.reset_rate_limits(url);

                            if let Some(prev) = *last_block {
                                if log.block_number > prev + self.block_gap_tolerance {
                                    self.metrics.data_gap(log.block_number.saturating_sub(prev));
                                    let _ = tx.send(SupervisorEvent::DataGap {
                                        endpoint: url.to_string(),
                                        previous_block: prev,
                                        observed_block: log.block_number
                                    });
                                }
                            }
                            *last_block = Some(log.block_number);

                            if tx.send(SupervisorEvent::Log(log)).is_err() {
                                return Err(());
                            }
                        }
                        Ok(Some(Err(sub_err))) => {
                            self.record_failure(url);
                            match sub_err {
                                SubscriptionError::RateLimited(_) => {
                                    self.metrics.rate_limited();
                                    let count = self.note_rate_limit(url);
                                    let cooldown = rate_limit_cooldown_millis(count);
                                    self.mark_excluded(url, cooldown, now_millis());
                                    return Ok(());
                                }
                                SubscriptionError::OverCapacity(_) => {
                                    self.mark_excluded(url, 0, now_millis());
                                    return Ok(());
                                }
                                SubscriptionError::Other(msg) => {
                                    self.metrics.parse_error();
                                    debug!(chain = self.chain, endpoint = url, error = %msg, "dropped malformed frame");
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Derives the staleness-threshold tier from a chain's block time
/// (5s / 10s / 15s tiers).
pub fn staleness_tier_millis(block_time_millis: u64) -> u64 {
    match block_time_millis {
        t if t <= 2_000 => 5_000,
        t if t <= 6_000 => 10_000,
        _ => 15_000
    }
}
