use std::time::Duration;

use redis::AsyncCommands;

/// The L2 distributed KV collaborator. A real deployment
/// points this at a shared Redis/Redis-Cluster instance; tests substitute
/// an in-memory double (see `testing-tools`).
#[async_trait::async_trait]
pub trait DistributedStore: Send + Sync {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> eyre::Result<()>;
}

/// Redis-backed [`DistributedStore`].
pub struct RedisStore {
    manager: redis::aio::ConnectionManager
}

impl RedisStore {
    pub async fn connect(url: &str) -> eyre::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl DistributedStore for RedisStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> eyre::Result<()> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }
}
