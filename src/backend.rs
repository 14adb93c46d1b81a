use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::redis_client::RedisClient;
use crate::types::{BackendRow, InteractionRecord};

/// Row store of interactions owned by an authenticated identity.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Rows owned by `user_id`, oldest first.
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<InteractionRecord>>;
    async fn insert(&self, user_id: &str, record: &InteractionRecord) -> Result<()>;
}

pub struct RedisBackendStore {
    redis: RedisClient,
    prefix: String,
}

impl RedisBackendStore {
    pub fn new(redis: RedisClient, prefix: String) -> Self {
        Self { redis, prefix }
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}:{}", self.prefix, user_id)
    }
}

#[async_trait]
impl BackendStore for RedisBackendStore {
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<InteractionRecord>> {
        let key = self.key(user_id);
        let raw_rows = self.redis.lrange_all(&key).await.context("fetch interaction rows")?;

        let rows = raw_rows
            .iter()
            .filter_map(|raw| match serde_json::from_str::<BackendRow>(raw) {
                Ok(row) => Some(row),
                Err(err) => {
                    warn!(key = %key, error = %err, "Skipping unreadable interaction row");
                    None
                }
            })
            .collect();

        let records = into_sorted_records(rows);
        info!(user_id, count = records.len(), "Interactions fetched");
        Ok(records)
    }

    async fn insert(&self, user_id: &str, record: &InteractionRecord) -> Result<()> {
        let row = BackendRow::new(user_id, record);
        let payload = serde_json::to_string(&row).context("serialise interaction row")?;
        self.redis
            .rpush(&self.key(user_id), &payload)
            .await
            .context("insert interaction row")
    }
}

#[derive(Default)]
pub struct MemoryBackendStore {
    rows: Mutex<Vec<BackendRow>>,
}

impl MemoryBackendStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackendStore for MemoryBackendStore {
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<InteractionRecord>> {
        let rows = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        Ok(into_sorted_records(rows))
    }

    async fn insert(&self, user_id: &str, record: &InteractionRecord) -> Result<()> {
        self.rows.lock().await.push(BackendRow::new(user_id, record));
        Ok(())
    }
}

fn into_sorted_records(mut rows: Vec<BackendRow>) -> Vec<InteractionRecord> {
    rows.sort_by_key(|row| row.timestamp);
    rows.into_iter().map(InteractionRecord::from).collect()
}
