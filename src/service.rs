use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::backend::BackendStore;
use crate::cache::InteractionCache;
use crate::classifier::classify;
use crate::metrics::{
    BACKEND_FAILURES_TOTAL, CACHED_INTERACTIONS, DASHBOARD_RESOLUTIONS_TOTAL, INTERACTIONS_RECORDED_TOTAL,
};
use crate::resolver::SourceResolver;
use crate::types::{DashboardView, InteractionRecord};

pub struct DashboardService {
    cache: Arc<dyn InteractionCache>,
    backend: Arc<dyn BackendStore>,
    resolver: SourceResolver,
    aggregator: Aggregator,
    snapshot: RwLock<Option<DashboardView>>,
    last_cache_count: Mutex<Option<usize>>,
}

impl DashboardService {
    pub fn new(
        cache: Arc<dyn InteractionCache>,
        backend: Arc<dyn BackendStore>,
        resolver: SourceResolver,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            cache,
            backend,
            resolver,
            aggregator,
            snapshot: RwLock::new(None),
            last_cache_count: Mutex::new(None),
        }
    }

    /// Classifies and stores a message at send time. The cache copy is always written;
    /// the backend row only when a user is signed in, and its failure is not fatal.
    pub async fn record_interaction(&self, user: Option<&str>, message: &str) -> Result<InteractionRecord> {
        let (category, sentiment) = classify(message);
        let record = InteractionRecord {
            user_message: message.to_string(),
            category,
            sentiment,
            timestamp: Utc::now(),
        };

        self.cache.append(&record).await.context("append to cache")?;

        if let Some(user_id) = user {
            if let Err(err) = self.backend.insert(user_id, &record).await {
                BACKEND_FAILURES_TOTAL.with_label_values(&["insert"]).inc();
                warn!(user_id, error = %err, "Backend insert failed; interaction kept in cache only");
            }
        }

        INTERACTIONS_RECORDED_TOTAL
            .with_label_values(&[category.as_str(), sentiment.as_str()])
            .inc();
        info!(
            category = category.as_str(),
            sentiment = sentiment.as_str(),
            signed_in = user.is_some(),
            "Interaction recorded"
        );

        Ok(record)
    }

    pub async fn dashboard(&self, user: Option<&str>) -> DashboardView {
        let source = self.resolver.resolve(user).await;
        DASHBOARD_RESOLUTIONS_TOTAL
            .with_label_values(&[source.origin.as_str()])
            .inc();
        self.aggregator
            .build_view(source.origin, source.state, source.notice, &source.records)
    }

    pub async fn user_interactions(&self, user_id: &str) -> Result<Vec<InteractionRecord>> {
        self.backend
            .fetch_for_user(user_id)
            .await
            .context("fetch user interactions")
    }

    /// Re-reads the cache slot and rebuilds the snapshot when its size changed.
    /// Returns whether the snapshot was rebuilt.
    pub async fn poll_cache(&self) -> bool {
        let records = self.cache.read().await;
        let count = records.len();
        CACHED_INTERACTIONS.set(count as i64);

        let mut last = self.last_cache_count.lock().await;
        if *last == Some(count) {
            return false;
        }
        let previous = last.replace(count);
        drop(last);

        let source = self.resolver.resolve_from_cache(records);
        let view = self
            .aggregator
            .build_view(source.origin, source.state, source.notice, &source.records);
        *self.snapshot.write().await = Some(view);

        info!(
            previous = ?previous,
            current = count,
            origin = source.origin.as_str(),
            "Cache changed; dashboard snapshot rebuilt"
        );
        true
    }

    pub async fn snapshot(&self) -> Option<DashboardView> {
        self.snapshot.read().await.clone()
    }
}
