use anyhow::Result;
use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::{
    collectors,
    config::Config,
    handlers::{self, AppState},
    metrics,
    pricing::{Aggregator, CacheStore, RefreshScheduler},
    signals::setup_signal_handlers,
};

/// Start the pricing service
///
/// This function:
/// 1. Initializes metrics
/// 2. Seeds the cache store from the persisted snapshot, if any
/// 3. Starts the refresh scheduler
/// 4. Sets up signal handlers for graceful shutdown and manual refresh
/// 5. Serves requests with graceful shutdown support
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let store = Arc::new(CacheStore::open(&config.cache.data_path));
    if let Some(snapshot) = store.get_snapshot() {
        metrics::set_cache_size(snapshot.size());
    }

    let aggregator = Arc::new(build_aggregator(&config)?);
    info!(
        "Registered collectors: {}",
        aggregator.collector_names().join(", ")
    );

    let scheduler = Arc::new(RefreshScheduler::new(
        aggregator,
        store,
        Duration::from_secs(config.cache.refresh_interval_seconds),
    ));

    // SIGTERM/SIGINT for shutdown; SIGHUP for a manual refresh
    let (shutdown_tx, signal_handle) = setup_signal_handlers(scheduler.clone());
    let mut shutdown_rx = shutdown_tx.subscribe();

    let refresh_handle = scheduler
        .clone()
        .spawn(config.cache.refresh_on_startup, shutdown_tx.subscribe());

    let metrics_route = metrics_handle.map(|handle| (config.metrics.endpoint.clone(), handle));
    let app = create_router(AppState::new(scheduler), metrics_route, &config.server.ui_dir);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting pricing service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    refresh_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Build the aggregator over every enabled collector
pub fn build_aggregator(config: &Config) -> Result<Aggregator> {
    let client = collectors::build_http_client(&config.collectors)?;
    let registered = collectors::build_collectors(&config.collectors, &client);

    Ok(Aggregator::new(
        registered,
        Duration::from_secs(config.collectors.timeout_seconds),
    )
    .with_concurrency(config.cache.concurrent_collectors))
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    state: AppState,
    metrics: Option<(String, Arc<PrometheusHandle>)>,
    ui_dir: &Path,
) -> Router {
    let api = Router::new()
        .route("/api/pricing", get(handlers::pricing::list_pricing))
        .route("/api/pricing/*model_id", get(handlers::pricing::get_pricing))
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/refresh", post(handlers::refresh::trigger_refresh))
        .with_state(state);

    let mut app = Router::new()
        .route("/", get(|| async { Redirect::temporary("/ui/") }))
        .nest_service("/ui", ServeDir::new(ui_dir))
        .merge(api);

    if let Some((endpoint, handle)) = metrics {
        app = app.merge(
            Router::new()
                .route(&endpoint, get(handlers::metrics_handler::metrics))
                .with_state(handle),
        );
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{
        CacheSnapshot, CollectorError, PriceCollector, PricingMap, PricingRecord, ServiceType,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Never finishes, keeping a triggered cycle in flight
    struct Hanging;

    #[async_trait]
    impl PriceCollector for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn fetch(&self) -> Result<PricingMap, CollectorError> {
            std::future::pending().await
        }
    }

    fn record(id: &str, provider: &str, service_type: ServiceType) -> PricingRecord {
        PricingRecord::new(id, provider, "https://example.test", service_type, json!({"id": id}))
    }

    fn create_test_state(ready: bool) -> AppState {
        let store = Arc::new(CacheStore::new());
        if ready {
            let mut records = PricingMap::new();
            records.insert(
                "openai/gpt-4".to_string(),
                record("openai/gpt-4", "openai", ServiceType::ApiEndpoint),
            );
            records.insert(
                "gemini/gemini-pro".to_string(),
                record("gemini/gemini-pro", "gemini", ServiceType::ApiEndpoint),
            );
            records.insert(
                "elevenlabs/pro".to_string(),
                record("elevenlabs/pro", "elevenlabs", ServiceType::Subscription),
            );
            store.publish(CacheSnapshot::new(records, Utc::now()));
        }

        let aggregator = Arc::new(Aggregator::new(
            vec![Arc::new(Hanging) as Arc<dyn PriceCollector>],
            Duration::from_secs(60),
        ));
        AppState::new(Arc::new(RefreshScheduler::new(
            aggregator,
            store,
            Duration::from_secs(3600),
        )))
    }

    fn app(ready: bool) -> Router {
        create_router(create_test_state(ready), None, Path::new("ui"))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_pricing() {
        let (status, body) = get_json(app(true), "/api/pricing").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_object().unwrap().len(), 3);
        assert_eq!(body["openai/gpt-4"]["api_identifier"], "openai");
    }

    #[tokio::test]
    async fn test_list_pricing_with_filters() {
        let (_, body) = get_json(app(true), "/api/pricing?service_type=api_endpoint").await;
        assert_eq!(body.as_object().unwrap().len(), 2);

        let (_, body) =
            get_json(app(true), "/api/pricing?service_type=api_endpoint&provider=gemini").await;
        let ids: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(ids, vec!["gemini/gemini-pro"]);

        let (_, body) = get_json(app(true), "/api/pricing?api_identifier=elevenlabs").await;
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_pricing_rejects_both_provider_names() {
        let (status, body) =
            get_json(app(true), "/api/pricing?provider=openai&api_identifier=gemini").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");
    }

    #[tokio::test]
    async fn test_list_pricing_not_ready_is_empty() {
        let (status, body) = get_json(app(false), "/api/pricing").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_get_pricing_with_slash_in_id() {
        let (status, body) = get_json(app(true), "/api/pricing/openai/gpt-4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_id"], "openai/gpt-4");
        assert_eq!(body["service_type"], "api_endpoint");
    }

    #[tokio::test]
    async fn test_get_pricing_not_found_and_not_ready() {
        let (status, body) = get_json(app(true), "/api/pricing/anthropic/claude-3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "model_not_found");

        let (status, body) = get_json(app(false), "/api/pricing/openai/gpt-4").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["message"], "Pricing cache not ready");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(true), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache_size"], 3);
        assert_eq!(body["refreshing"], false);
        assert!(body["updated"].is_string());
        assert!(body["last_refresh"].is_null());

        let (_, body) = get_json(app(false), "/api/health").await;
        assert_eq!(body["status"], "starting");
        assert_eq!(body["cache_size"], 0);
        assert!(body["updated"].is_null());
    }

    #[tokio::test]
    async fn test_refresh_is_refused_while_running() {
        let app = app(true);
        let post = || {
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(post()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"status": "started"}));

        let response = app.clone().oneshot(post()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"status": "already_in_progress"})
        );

        let (_, health) = get_json(app, "/api/health").await;
        assert_eq!(health["refreshing"], true);
    }

    #[tokio::test]
    async fn test_root_redirects_to_ui() {
        let response = app(true)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/ui/");
    }

    #[tokio::test]
    async fn test_ui_is_served_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Pricing</h1>").unwrap();

        let app = create_router(create_test_state(true), None, dir.path());
        let response = app
            .oneshot(Request::builder().uri("/ui/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Pricing</h1>");
    }

    #[tokio::test]
    async fn test_metrics_route_and_cors() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = Arc::new(recorder.handle());
        let app = create_router(
            create_test_state(true),
            Some(("/metrics".to_string(), handle)),
            Path::new("ui"),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .header(header::ORIGIN, "https://dashboard.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_build_aggregator_respects_config() {
        let mut config = Config::default();
        config.collectors.hedra.enabled = false;

        let aggregator = build_aggregator(&config).unwrap();
        assert_eq!(
            aggregator.collector_names(),
            vec!["openai", "fal", "runway", "elevenlabs", "gemini"]
        );
    }
}
