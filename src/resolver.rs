use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::BackendStore;
use crate::cache::InteractionCache;
use crate::demo::DemoGenerator;
use crate::external::ExternalSource;
use crate::metrics::{BACKEND_FAILURES_TOTAL, EXTERNAL_FETCH_FAILURES_TOTAL};
use crate::types::{DataOrigin, InteractionRecord, SourceState};

#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Fetch<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSignals {
    pub user: Option<String>,
    pub backend: Fetch<Vec<InteractionRecord>>,
    pub external: Fetch<Vec<InteractionRecord>>,
    pub cache: Vec<InteractionRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub origin: DataOrigin,
    pub state: SourceState,
    pub notice: Option<String>,
    pub records: Vec<InteractionRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Pending,
    Resolved(ResolvedSource),
}

/// Priority: external, then the signed-in user's backend rows, then cache, then demo.
/// A failed backend reads as empty; a failed external source sets the notice and falls through.
pub fn resolve_signals(signals: SourceSignals, demo: impl FnOnce() -> Vec<InteractionRecord>) -> Resolution {
    let user_present = signals.user.is_some();
    if signals.external.is_loading() || (user_present && signals.backend.is_loading()) {
        return Resolution::Pending;
    }

    let backend = match signals.backend {
        Fetch::Ready(records) if user_present => records,
        _ => Vec::new(),
    };
    let external = match signals.external {
        Fetch::Ready(records) => Ok(records),
        Fetch::Failed(notice) => Err(notice),
        Fetch::Loading => Ok(Vec::new()),
    };

    Resolution::Resolved(select(user_present, backend, external, signals.cache, demo))
}

fn select(
    user_present: bool,
    backend: Vec<InteractionRecord>,
    external: Result<Vec<InteractionRecord>, String>,
    cache: Vec<InteractionRecord>,
    demo: impl FnOnce() -> Vec<InteractionRecord>,
) -> ResolvedSource {
    let backend_empty = backend.is_empty();
    let (external, notice) = match external {
        Ok(records) => (records, None),
        Err(notice) => (Vec::new(), Some(notice)),
    };

    let (origin, records) = if !external.is_empty() {
        (DataOrigin::External, external)
    } else if user_present && !backend_empty {
        (DataOrigin::Backend, backend)
    } else if !cache.is_empty() {
        (DataOrigin::Cache, cache)
    } else {
        (DataOrigin::Demo, demo())
    };

    let state = if notice.is_some() {
        SourceState::ExternalDataError
    } else if origin == DataOrigin::External {
        SourceState::ExternalDataAvailable
    } else if !user_present {
        SourceState::NoUser
    } else if backend_empty {
        SourceState::UserNoData
    } else {
        SourceState::UserWithData
    };

    ResolvedSource {
        origin,
        state,
        notice,
        records,
    }
}

pub struct SourceResolver {
    cache: Arc<dyn InteractionCache>,
    backend: Arc<dyn BackendStore>,
    external: Arc<dyn ExternalSource>,
    demo: DemoGenerator,
}

impl SourceResolver {
    pub fn new(
        cache: Arc<dyn InteractionCache>,
        backend: Arc<dyn BackendStore>,
        external: Arc<dyn ExternalSource>,
        demo: DemoGenerator,
    ) -> Self {
        Self {
            cache,
            backend,
            external,
            demo,
        }
    }

    pub async fn resolve(&self, user: Option<&str>) -> ResolvedSource {
        let backend = async {
            let Some(user_id) = user else {
                return Fetch::Ready(Vec::new());
            };
            match self.backend.fetch_for_user(user_id).await {
                Ok(records) => Fetch::Ready(records),
                Err(err) => {
                    BACKEND_FAILURES_TOTAL.with_label_values(&["fetch"]).inc();
                    warn!(user_id, error = %err, "Backend fetch failed; treating as empty");
                    Fetch::Failed(err.to_string())
                }
            }
        };
        let external = async {
            match self.external.fetch().await {
                Ok(records) => Fetch::Ready(records),
                Err(err) => {
                    EXTERNAL_FETCH_FAILURES_TOTAL.inc();
                    warn!(error = %err, "External data fetch failed; falling back");
                    Fetch::Failed(err.notice().to_string())
                }
            }
        };

        let (backend, external, cache) = tokio::join!(backend, external, self.cache.read());
        let resolved = self.settle(SourceSignals {
            user: user.map(str::to_string),
            backend,
            external,
            cache,
        });

        info!(
            origin = resolved.origin.as_str(),
            state = ?resolved.state,
            records = resolved.records.len(),
            "Dashboard source resolved"
        );
        resolved
    }

    /// Used by the background poll, where no user or widget is involved.
    pub fn resolve_from_cache(&self, cache: Vec<InteractionRecord>) -> ResolvedSource {
        self.settle(SourceSignals {
            user: None,
            backend: Fetch::Ready(Vec::new()),
            external: Fetch::Ready(Vec::new()),
            cache,
        })
    }

    // every fetch has completed by the time signals reach here
    fn settle(&self, signals: SourceSignals) -> ResolvedSource {
        match resolve_signals(signals, || self.demo.generate()) {
            Resolution::Resolved(source) => source,
            Resolution::Pending => {
                warn!("Source resolution reported pending after all fetches completed; showing demo data");
                select(false, Vec::new(), Ok(Vec::new()), Vec::new(), || self.demo.generate())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone, Utc};

    use super::*;
    use crate::backend::MemoryBackendStore;
    use crate::cache::MemoryInteractionCache;
    use crate::error::ExternalSourceError;
    use crate::types::{Category, Sentiment};

    fn record(message: &str) -> InteractionRecord {
        InteractionRecord {
            user_message: message.to_string(),
            category: Category::Questions,
            sentiment: Sentiment::Neutral,
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap(),
        }
    }

    fn demo() -> Vec<InteractionRecord> {
        vec![record("demo")]
    }

    fn signals(
        user: Option<&str>,
        backend: Fetch<Vec<InteractionRecord>>,
        external: Fetch<Vec<InteractionRecord>>,
        cache: Vec<InteractionRecord>,
    ) -> SourceSignals {
        SourceSignals {
            user: user.map(str::to_string),
            backend,
            external,
            cache,
        }
    }

    fn resolved(resolution: Resolution) -> ResolvedSource {
        match resolution {
            Resolution::Resolved(source) => source,
            Resolution::Pending => panic!("expected a resolved source"),
        }
    }

    #[test]
    fn pending_while_external_loads() {
        let resolution = resolve_signals(
            signals(None, Fetch::Ready(vec![]), Fetch::Loading, vec![record("c")]),
            demo,
        );
        assert_eq!(resolution, Resolution::Pending);
    }

    #[test]
    fn pending_while_user_backend_loads() {
        let resolution = resolve_signals(
            signals(Some("alice"), Fetch::Loading, Fetch::Ready(vec![]), vec![]),
            demo,
        );
        assert_eq!(resolution, Resolution::Pending);
    }

    #[test]
    fn backend_loading_is_ignored_without_user() {
        let source = resolved(resolve_signals(
            signals(None, Fetch::Loading, Fetch::Ready(vec![]), vec![]),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Demo);
        assert_eq!(source.state, SourceState::NoUser);
    }

    #[test]
    fn external_data_has_top_priority() {
        let source = resolved(resolve_signals(
            signals(
                Some("alice"),
                Fetch::Ready(vec![record("b")]),
                Fetch::Ready(vec![record("e")]),
                vec![record("c")],
            ),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::External);
        assert_eq!(source.state, SourceState::ExternalDataAvailable);
        assert_eq!(source.records[0].user_message, "e");
    }

    #[test]
    fn user_backend_beats_cache() {
        let source = resolved(resolve_signals(
            signals(
                Some("alice"),
                Fetch::Ready(vec![record("b")]),
                Fetch::Ready(vec![]),
                vec![record("c")],
            ),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Backend);
        assert_eq!(source.state, SourceState::UserWithData);
    }

    #[test]
    fn user_without_rows_falls_back_to_cache_then_demo() {
        let source = resolved(resolve_signals(
            signals(Some("alice"), Fetch::Ready(vec![]), Fetch::Ready(vec![]), vec![record("c")]),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Cache);
        assert_eq!(source.state, SourceState::UserNoData);

        let source = resolved(resolve_signals(
            signals(Some("alice"), Fetch::Ready(vec![]), Fetch::Ready(vec![]), vec![]),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Demo);
        assert_eq!(source.records, demo());
    }

    #[test]
    fn failed_backend_reads_as_empty() {
        let source = resolved(resolve_signals(
            signals(
                Some("alice"),
                Fetch::Failed("timeout".into()),
                Fetch::Ready(vec![]),
                vec![],
            ),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Demo);
        assert_eq!(source.state, SourceState::UserNoData);
    }

    #[test]
    fn external_failure_surfaces_notice_and_falls_through() {
        let source = resolved(resolve_signals(
            signals(
                Some("alice"),
                Fetch::Ready(vec![record("b")]),
                Fetch::Failed("Failed to fetch chatbot data".into()),
                vec![],
            ),
            demo,
        ));
        assert_eq!(source.origin, DataOrigin::Backend);
        assert_eq!(source.state, SourceState::ExternalDataError);
        assert_eq!(source.notice.as_deref(), Some("Failed to fetch chatbot data"));
    }

    #[test]
    fn demo_is_only_generated_when_selected() {
        let source = resolved(resolve_signals(
            signals(None, Fetch::Ready(vec![]), Fetch::Ready(vec![]), vec![record("c")]),
            || panic!("demo data should not be generated"),
        ));
        assert_eq!(source.origin, DataOrigin::Cache);
    }

    enum FakeExternal {
        Records(Vec<InteractionRecord>),
        Failing,
    }

    #[async_trait]
    impl ExternalSource for FakeExternal {
        async fn fetch(&self) -> Result<Vec<InteractionRecord>, ExternalSourceError> {
            match self {
                Self::Records(records) => Ok(records.clone()),
                Self::Failing => Err(ExternalSourceError::Remote("boom".into())),
            }
        }
    }

    struct BrokenBackend;

    #[async_trait]
    impl BackendStore for BrokenBackend {
        async fn fetch_for_user(&self, _user_id: &str) -> anyhow::Result<Vec<InteractionRecord>> {
            Err(anyhow!("connection refused"))
        }

        async fn insert(&self, _user_id: &str, _record: &InteractionRecord) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    fn resolver(
        cache: Arc<dyn InteractionCache>,
        backend: Arc<dyn BackendStore>,
        external: FakeExternal,
    ) -> SourceResolver {
        SourceResolver::new(
            cache,
            backend,
            Arc::new(external),
            DemoGenerator::new(FixedOffset::east_opt(0).unwrap()),
        )
    }

    #[tokio::test]
    async fn resolve_prefers_user_rows_over_cache() {
        let cache = Arc::new(MemoryInteractionCache::new());
        cache.append(&record("cached")).await.unwrap();
        let backend = Arc::new(MemoryBackendStore::new());
        backend.insert("alice", &record("mine")).await.unwrap();

        let resolver = resolver(cache, backend, FakeExternal::Records(vec![]));

        let source = resolver.resolve(Some("alice")).await;
        assert_eq!(source.origin, DataOrigin::Backend);
        assert_eq!(source.records[0].user_message, "mine");

        let anonymous = resolver.resolve(None).await;
        assert_eq!(anonymous.origin, DataOrigin::Cache);
        assert_eq!(anonymous.state, SourceState::NoUser);
    }

    #[tokio::test]
    async fn resolve_survives_every_source_failing() {
        let cache = Arc::new(MemoryInteractionCache::with_raw("not json"));
        let resolver = resolver(cache, Arc::new(BrokenBackend), FakeExternal::Failing);

        let source = resolver.resolve(Some("alice")).await;
        assert_eq!(source.origin, DataOrigin::Demo);
        assert_eq!(source.state, SourceState::ExternalDataError);
        assert_eq!(source.notice.as_deref(), Some("Failed to fetch chatbot data"));
        assert!((14..=56).contains(&source.records.len()));
    }

    #[tokio::test]
    async fn resolve_matches_the_signal_rules_for_a_failed_backend() {
        let cache = Arc::new(MemoryInteractionCache::new());
        cache.append(&record("cached")).await.unwrap();
        let resolver = resolver(cache.clone(), Arc::new(BrokenBackend), FakeExternal::Records(vec![]));

        let live = resolver.resolve(Some("alice")).await;
        let expected = resolved(resolve_signals(
            signals(
                Some("alice"),
                Fetch::Failed("connection refused".into()),
                Fetch::Ready(vec![]),
                cache.read().await,
            ),
            demo,
        ));
        assert_eq!(live, expected);
        assert_eq!(live.origin, DataOrigin::Cache);
        assert_eq!(live.state, SourceState::UserNoData);
    }

    #[tokio::test]
    async fn demo_data_is_not_written_to_the_cache() {
        let cache = Arc::new(MemoryInteractionCache::new());
        let resolver = resolver(cache.clone(), Arc::new(MemoryBackendStore::new()), FakeExternal::Records(vec![]));

        let source = resolver.resolve_from_cache(cache.read().await);
        assert_eq!(source.origin, DataOrigin::Demo);
        assert!(cache.raw().await.is_none());
    }
}
