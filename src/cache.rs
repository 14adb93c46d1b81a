use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::metrics::CACHE_PARSE_FAILURES_TOTAL;
use crate::redis_client::RedisClient;
use crate::types::InteractionRecord;

#[async_trait]
pub trait InteractionCache: Send + Sync {
    /// Absent or malformed slots read as empty.
    async fn read(&self) -> Vec<InteractionRecord>;
    /// Appends without dropping entries already in the slot.
    async fn append(&self, record: &InteractionRecord) -> Result<()>;
}

pub struct RedisInteractionCache {
    redis: RedisClient,
    key: String,
}

impl RedisInteractionCache {
    pub fn new(redis: RedisClient, key: String) -> Self {
        Self { redis, key }
    }
}

#[async_trait]
impl InteractionCache for RedisInteractionCache {
    async fn read(&self) -> Vec<InteractionRecord> {
        match self.redis.get(&self.key).await {
            Ok(raw) => parse_slot(raw.as_deref()),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Cache read failed; treating as empty");
                Vec::new()
            }
        }
    }

    async fn append(&self, record: &InteractionRecord) -> Result<()> {
        self.redis
            .update(&self.key, |raw| append_to_slot(raw, record))
            .await
            .context("append to cache slot")
    }
}

#[derive(Default)]
pub struct MemoryInteractionCache {
    slot: Mutex<Option<String>>,
}

impl MemoryInteractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub async fn raw(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl InteractionCache for MemoryInteractionCache {
    async fn read(&self) -> Vec<InteractionRecord> {
        parse_slot(self.slot.lock().await.as_deref())
    }

    async fn append(&self, record: &InteractionRecord) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let updated = append_to_slot(slot.as_deref(), record)?;
        *slot = Some(updated);
        Ok(())
    }
}

fn parse_slot(raw: Option<&str>) -> Vec<InteractionRecord> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Vec::new();
    };

    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(err) => {
            CACHE_PARSE_FAILURES_TOTAL.inc();
            warn!(error = %err, "Malformed cache slot; treating as empty");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<InteractionRecord>(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(error = %err, "Skipping unreadable cache entry");
                None
            }
        })
        .collect()
}

/// Entries are kept as raw JSON so ones this version cannot read survive the rewrite.
fn append_to_slot(raw: Option<&str>, record: &InteractionRecord) -> Result<String> {
    let mut entries: Vec<Value> = match raw.filter(|value| !value.trim().is_empty()) {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|err| {
            CACHE_PARSE_FAILURES_TOTAL.inc();
            warn!(error = %err, "Malformed cache slot; starting a new array");
            Vec::new()
        }),
        None => Vec::new(),
    };
    entries.push(serde_json::to_value(record).context("serialise interaction record")?);
    serde_json::to_string(&entries).context("serialise cache slot")
}
