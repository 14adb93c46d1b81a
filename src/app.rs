use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::backend::{BackendStore, RedisBackendStore};
use crate::cache::{InteractionCache, RedisInteractionCache};
use crate::config::Settings;
use crate::demo::DemoGenerator;
use crate::external::HttpExternalSource;
use crate::metrics::gather_metrics;
use crate::redis_client::RedisClient;
use crate::resolver::SourceResolver;
use crate::service::DashboardService;

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    service: Arc<DashboardService>,
}

pub async fn run(settings: Settings) -> Result<()> {
    if let Some(value) = &settings.invalid_timeline_start {
        warn!(value = %value, "Invalid TIMELINE_START_DATE; using sparse timeline");
    }

    let settings = Arc::new(settings);
    let redis = RedisClient::new(&settings.redis_url).await?;
    redis.ensure_connection().await?;

    let service = Arc::new(build_service(&settings, redis)?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let poll_loop = spawn_cache_poll_loop(service.clone(), settings.clone(), shutdown_tx.subscribe());
    let http_server = serve_http(settings.clone(), service, shutdown_tx.subscribe());
    let metrics_server = serve_metrics(settings.clone(), shutdown_tx.subscribe());

    info!(
        instance_id = %settings.instance_id,
        http_port = settings.http_port,
        metrics_port = settings.prometheus_port,
        external_source = settings.external_data_url.is_some(),
        timeline = ?settings.timeline_policy,
        "Insights service started"
    );

    signal::ctrl_c().await.context("listen for shutdown signal")?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(());

    poll_loop.await.ok();
    for server in [http_server, metrics_server] {
        match server.await {
            Ok(Err(err)) => error!(error = %err, "Server stopped with an error"),
            Err(err) => error!(error = %err, "Server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    info!("Insights service shutdown complete");
    Ok(())
}

fn build_service(settings: &Settings, redis: RedisClient) -> Result<DashboardService> {
    let cache: Arc<dyn InteractionCache> = Arc::new(RedisInteractionCache::new(redis.clone(), settings.cache_key.clone()));
    let backend: Arc<dyn BackendStore> = Arc::new(RedisBackendStore::new(redis, settings.backend_prefix.clone()));
    let external = HttpExternalSource::new(
        settings.external_data_url.clone(),
        settings.external_data_token.clone(),
        settings.external_timeout,
    )
    .context("build external data client")?;

    let resolver = SourceResolver::new(
        cache.clone(),
        backend.clone(),
        Arc::new(external),
        DemoGenerator::new(settings.report_offset),
    );
    let aggregator = Aggregator::new(settings.report_offset, settings.timeline_policy);
    Ok(DashboardService::new(cache, backend, resolver, aggregator))
}

fn spawn_cache_poll_loop(
    service: Arc<DashboardService>,
    settings: Arc<Settings>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            service.poll_cache().await;
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Cache poll loop stopping");
                    break;
                }
                _ = tokio::time::sleep(settings.cache_poll_interval) => {}
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user: Option<String>,
}

impl UserQuery {
    fn user(&self) -> Option<&str> {
        self.user.as_deref().map(str::trim).filter(|user| !user.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewInteraction {
    message: String,
    #[serde(default)]
    user_id: Option<String>,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard", get(dashboard))
        .route("/api/interactions", get(list_interactions).post(create_interaction))
        .route("/api/snapshot", get(snapshot))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "instanceId": state.settings.instance_id }))
}

async fn dashboard(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    Json(state.service.dashboard(query.user()).await).into_response()
}

async fn list_interactions(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    let Some(user_id) = query.user() else {
        return error_response(StatusCode::BAD_REQUEST, "user is required");
    };
    match state.service.user_interactions(user_id).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            warn!(user_id, error = %err, "Listing interactions failed");
            error_response(StatusCode::BAD_GATEWAY, "interaction store unavailable")
        }
    }
}

async fn create_interaction(State(state): State<AppState>, Json(body): Json<NewInteraction>) -> Response {
    let message = body.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }
    let user = body.user_id.as_deref().map(str::trim).filter(|user| !user.is_empty());

    match state.service.record_interaction(user, message).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => {
            warn!(error = %err, "Recording interaction failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "interaction could not be stored")
        }
    }
}

async fn snapshot(State(state): State<AppState>) -> Response {
    match state.service.snapshot().await {
        Some(view) => Json(view).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no snapshot yet"),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn serve_http(
    settings: Arc<Settings>,
    service: Arc<DashboardService>,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<Result<()>> {
    let port = settings.http_port;
    let app = router(AppState { settings, service });
    spawn_server(app, port, shutdown)
}

fn serve_metrics(settings: Arc<Settings>, shutdown: broadcast::Receiver<()>) -> JoinHandle<Result<()>> {
    let router = Router::new().route(
        "/metrics",
        get(|| async { ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], gather_metrics()) }),
    );
    spawn_server(router, settings.prometheus_port, shutdown)
}

fn spawn_server(app: Router, port: u16, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind listener on {addr}"))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .context("serve http")
    })
}
