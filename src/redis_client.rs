use std::sync::Arc;

use anyhow::{bail, Context};
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::Mutex;

const UPDATE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct RedisClient {
    inner: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let client = Client::open(url.to_string()).context("Failed to create Redis client")?;
        let manager = client
            .get_tokio_connection_manager()
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self {
            inner: Arc::new(Mutex::new(manager)),
        })
    }

    pub async fn ensure_connection(&self) -> anyhow::Result<()> {
        let mut conn = self.inner.lock().await;
        redis::cmd("PING")
            .query_async::<_, ()>(&mut *conn)
            .await
            .context("Redis PING failed")
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.inner.lock().await;
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut *conn)
            .await
            .context("Redis GET failed")
    }

    /// Rewrites a string key from its current value. The connection stays locked for the
    /// whole WATCH/GET/MULTI/SET/EXEC cycle; a write from another client aborts EXEC and the
    /// cycle is retried against the fresh value.
    pub async fn update<F>(&self, key: &str, mut rewrite: F) -> anyhow::Result<()>
    where
        F: FnMut(Option<&str>) -> anyhow::Result<String> + Send,
    {
        let mut conn = self.inner.lock().await;
        for _ in 0..UPDATE_ATTEMPTS {
            redis::cmd("WATCH")
                .arg(key)
                .query_async::<_, ()>(&mut *conn)
                .await
                .context("Redis WATCH failed")?;

            let current = redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut *conn)
                .await
                .context("Redis GET failed")?;

            let updated = match rewrite(current.as_deref()) {
                Ok(updated) => updated,
                Err(err) => {
                    redis::cmd("UNWATCH").query_async::<_, ()>(&mut *conn).await.ok();
                    return Err(err);
                }
            };

            let committed = redis::pipe()
                .atomic()
                .set(key, updated)
                .query_async::<_, Option<redis::Value>>(&mut *conn)
                .await
                .context("Redis MULTI/EXEC failed")?;
            if committed.is_some() {
                return Ok(());
            }
        }
        bail!("Redis update of {key} kept conflicting after {UPDATE_ATTEMPTS} attempts")
    }

    pub async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.inner.lock().await;
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut *conn)
            .await
            .context("Redis RPUSH failed")
    }

    pub async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.inner.lock().await;
        redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async::<_, Vec<String>>(&mut *conn)
            .await
            .context("Redis LRANGE failed")
    }
}
