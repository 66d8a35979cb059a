// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::alert_sink::AlertSink;
use crate::application::evaluator::Evaluator;
use crate::application::ingest::ReadingIngest;
use crate::application::monitor_repository::MonitorRepository;
use crate::application::notification::{AlertHistory, NotificationCenter};
use crate::application::report_service::ReportService;
use crate::application::threshold_store::ThresholdStore;
use crate::application::vat_config::VatConfigService;
use crate::application::vat_registry::VatRegistry;
use crate::infrastructure::config::{load_backend_config, load_monitor_config};
use crate::infrastructure::polling_feed::PollingChangeFeed;
use crate::infrastructure::postgrest_repository::PostgrestRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    configure_vat, generate_report, health_check, list_alerts, mark_alert_read,
    mark_alert_resolved, reading_stats, refresh_thresholds, stream_notices,
};

const NOTICE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tina_monitor=debug")),
        )
        .init();

    // Load configuration
    let backend_config = load_backend_config()?;
    let monitor_config = load_monitor_config()?;
    let alerts = monitor_config.alerts;
    tracing::info!(
        "Backend {} (schema {}), dedup {:?}",
        backend_config.backend.url,
        backend_config.backend.schema,
        alerts.dedup.mode
    );

    // Create repository (infrastructure layer)
    let repository: Arc<dyn MonitorRepository> = Arc::new(PostgrestRepository::new(
        backend_config.backend.url,
        backend_config.backend.api_key,
        backend_config.backend.schema,
        Duration::from_secs(backend_config.backend.request_timeout_secs),
    )?);

    // Create services (application layer)
    let notifications = NotificationCenter::new(NOTICE_CAPACITY);
    let vats = Arc::new(VatRegistry::new(repository.clone()));
    let thresholds = Arc::new(ThresholdStore::new(repository.clone()));
    let evaluator = Evaluator::new(thresholds.clone(), alerts.level_bounds);
    let alert_sink = Arc::new(AlertSink::new(
        repository.clone(),
        notifications.clone(),
        alerts.dedup.policy()?,
    ));
    let ingest = Arc::new(ReadingIngest::new(
        repository.clone(),
        vats.clone(),
        thresholds.clone(),
        evaluator,
        alert_sink.clone(),
        notifications.clone(),
        alerts.reading_history_limit,
    ));

    ingest.bootstrap().await;

    // Only changes after the latest cached insert or update are evaluated
    let since = ingest.latest_change().unwrap_or_else(Utc::now);
    let feed = PollingChangeFeed::new(
        repository.clone(),
        vats.clone(),
        Duration::from_millis(alerts.poll_interval_ms),
        since,
    );
    let ingest_handle = ingest.start(&feed);

    let state = Arc::new(AppState {
        alert_history: AlertHistory::new(repository.clone(), notifications.clone(), alerts.page_size),
        alert_sink,
        vat_config: VatConfigService::new(
            repository.clone(),
            vats.clone(),
            thresholds,
            notifications.clone(),
        ),
        report_service: ReportService::new(
            repository,
            vats,
            notifications.clone(),
            alerts.reading_history_limit,
        ),
        ingest,
        notifications,
    });

    // Build router (presentation layer)
    // Responses are compressed by our own builders, so no CompressionLayer
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/alerts", get(list_alerts))
        .route("/alerts/stream", get(stream_notices))
        .route("/alerts/:id/read", post(mark_alert_read))
        .route("/alerts/:id/resolve", post(mark_alert_resolved))
        .route("/vats/:id/config", put(configure_vat))
        .route("/thresholds/refresh", post(refresh_thresholds))
        .route("/readings/stats", get(reading_stats))
        .route("/reports", get(generate_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = monitor_config.server.listen_addr.parse()?;
    tracing::info!("Starting tina-monitor service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ingest_handle.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
