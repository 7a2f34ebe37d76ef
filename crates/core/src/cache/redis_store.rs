use crate::cache::{PredictionStore, STORE_OP_TIMEOUT};
use anyhow::Context;
use redis::aio::MultiplexedConnection;

/// Redis-backed store using `GET` / `SETEX`. The multiplexed connection is
/// cloned per call and shared across request tasks.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)
            .with_context(|| format!("invalid REDIS_URL: {redis_url}"))?;
        let connect = client.get_multiplexed_tokio_connection();
        let conn = tokio::time::timeout(STORE_OP_TIMEOUT, connect)
            .await
            .map_err(|_| {
                anyhow::anyhow!("redis connect timed out after {}ms", STORE_OP_TIMEOUT.as_millis())
            })?
            .context("redis connect failed")?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl PredictionStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .context("redis PING failed")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .with_context(|| format!("redis GET {key} failed"))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .with_context(|| format!("redis SETEX {key} failed"))
    }
}
