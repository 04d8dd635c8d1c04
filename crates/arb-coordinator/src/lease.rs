use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};

use arb_metrics::CoordinatorMetrics;
use arb_types::config::LeaderLeaseConfig;
use rand::Rng;
use tokio::sync::Notify;
use tracing::{info, warn};

/// A single key held with TTL, acquired and renewed via compare-and-expire —
/// never a blind renew ("renewal must atomically verify
/// ownership").
#[async_trait::async_trait]
pub trait LeaderLease: Send + Sync {
    /// Succeeds only if the lease is unheld or already held by `holder_id`.
    async fn try_acquire_or_renew(&self, holder_id: &str, ttl_millis: u64) -> eyre::Result<bool>;

    /// Best-effort; does nothing if the lease is held by someone else.
    async fn release(&self, holder_id: &str) -> eyre::Result<()>;
}

/// `SET key holder_id PX ttl NX`, or a renew when `holder_id` already holds
/// it — one round trip, one atomic decision.
const ACQUIRE_OR_RENEW_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == false or current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
    return 1
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('DEL', KEYS[1])
end
return 1
"#;

pub struct RedisLeaderLease {
    manager: redis::aio::ConnectionManager,
    key:     String
}

impl RedisLeaderLease {
    pub fn new(manager: redis::aio::ConnectionManager, key: impl Into<String>) -> Self {
        Self { manager, key: key.into() }
    }
}

#[async_trait::async_trait]
impl LeaderLease for RedisLeaderLease {
    async fn try_acquire_or_renew(&self, holder_id: &str, ttl_millis: u64) -> eyre::Result<bool> {
        let mut conn = self.manager.clone();
        let acquired: i64 = redis::Script::new(ACQUIRE_OR_RENEW_SCRIPT)
            .key(&self.key)
            .arg(holder_id)
            .arg(ttl_millis)
            .invoke_async(&mut conn)
            .await?;
        Ok(acquired == 1)
    }

    async fn release(&self, holder_id: &str) -> eyre::Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::Script::new(RELEASE_SCRIPT).key(&self.key).arg(holder_id).invoke_async(&mut conn).await?;
        Ok(())
    }
}

/// `baseDelay ± uniform(-2s, +2s)` jitter, clamped to never go
/// negative.
fn retry_delay_millis(base_millis: u64) -> u64 {
    let jitter: i64 = rand::thread_rng().gen_range(-2_000..=2_000);
    (base_millis as i64 + jitter).max(0) as u64
}

/// Owns the acquire/renew loop and exposes `is_leader()` for the router's
/// per-message leader check — a plain atomic read, never blocking on the
/// network.
pub struct LeaseElector {
    lease:     Arc<dyn LeaderLease>,
    holder_id: String,
    config:    LeaderLeaseConfig,
    is_leader: Arc<AtomicBool>,
    stopped:   Arc<AtomicBool>,
    metrics:   CoordinatorMetrics,
    wake:      Arc<Notify>
}

impl LeaseElector {
    pub fn new(lease: Arc<dyn LeaderLease>, holder_id: impl Into<String>, config: LeaderLeaseConfig) -> Self {
        Self {
            lease,
            holder_id: holder_id.into(),
            config,
            is_leader: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            metrics: CoordinatorMetrics,
            wake: Arc::new(Notify::new())
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Spawns the background acquire/renew loop.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    async fn run(&self) {
        while !self.stopped.load(Ordering::SeqCst) {
            let acquired = match self.lease.try_acquire_or_renew(&self.holder_id, self.config.leader_lock_ttl_millis).await {
                Ok(acquired) => acquired,
                Err(err) => {
                    warn!(error = %err, "leader lease renewal failed, treating as lost");
                    false
                }
            };

            let was_leader = self.is_leader.swap(acquired, Ordering::SeqCst);
            if acquired != was_leader {
                info!(holder = %self.holder_id, is_leader = acquired, "leader status changed");
                self.metrics.leader_changed(acquired);
            }

            let delay_millis = if acquired {
                // Renew well before the TTL expires.
                self.config.leader_lock_ttl_millis / 3
            } else {
                retry_delay_millis(self.config.base_retry_delay_millis)
            };

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_millis(delay_millis)) => {}
                _ = self.wake.notified() => {}
            }
        }
        if self.is_leader.load(Ordering::SeqCst) {
            let _ = self.lease.release(&self.holder_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct InMemoryLease {
        holder: Mutex<Option<String>>
    }

    #[async_trait::async_trait]
    impl LeaderLease for InMemoryLease {
        async fn try_acquire_or_renew(&self, holder_id: &str, _ttl_millis: u64) -> eyre::Result<bool> {
            let mut holder = self.holder.lock().unwrap();
            match holder.as_deref() {
                None => {
                    *holder = Some(holder_id.to_string());
                    Ok(true)
                }
                Some(current) if current == holder_id => Ok(true),
                Some(_) => Ok(false)
            }
        }

        async fn release(&self, holder_id: &str) -> eyre::Result<()> {
            let mut holder = self.holder.lock().unwrap();
            if holder.as_deref() == Some(holder_id) {
                *holder = None;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn single_elector_becomes_leader() {
        let lease = Arc::new(InMemoryLease { holder: Mutex::new(None) });
        let elector = Arc::new(LeaseElector::new(
            lease,
            "node-a",
            LeaderLeaseConfig { leader_lock_ttl_millis: 300, base_retry_delay_millis: 50 }
        ));
        let handle = elector.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(elector.is_leader());
        elector.stop();
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), handle).await;
    }

    #[tokio::test]
    async fn second_elector_stays_follower_while_first_holds() {
        let lease = Arc::new(InMemoryLease { holder: Mutex::new(None) });
        let a = Arc::new(LeaseElector::new(
            lease.clone(),
            "node-a",
            LeaderLeaseConfig { leader_lock_ttl_millis: 300, base_retry_delay_millis: 50 }
        ));
        let b = Arc::new(LeaseElector::new(
            lease,
            "node-b",
            LeaderLeaseConfig { leader_lock_ttl_millis: 300, base_retry_delay_millis: 50 }
        ));
        let handle_a = a.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let handle_b = b.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(a.is_leader());
        assert!(!b.is_leader());

        a.stop();
        b.stop();
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), handle_a).await;
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), handle_b).await;
    }
}
