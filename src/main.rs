//!
//! AutoVolt energy accounting service.
//! Reads configuration from TOML file (~/.config/autovolt-energy/config.toml).

use std::sync::Arc;

use tracing::{error, info, warn};

use autovolt_energy::application::services::{
    AggregationScheduler, AggregationService, CostService, HealthService, LedgerConfig,
    LedgerGenerator, ReconciliationConfig, ReconciliationJob, SchedulerConfig, TelemetryIngestor,
};
use autovolt_energy::application::{ChangeTracker, PipelineMetrics};
use autovolt_energy::domain::RepositoryProvider;
use autovolt_energy::shared::shutdown::ShutdownCoordinator;
use autovolt_energy::{
    connect_and_migrate, default_config_path, AppConfig, SeaOrmRepositoryProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("AUTOVOLT_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting AutoVolt energy accounting service...");

    let tz = app_cfg.facility.tz()?;
    info!("Facility timezone: {}", tz);

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let _prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Database ───────────────────────────────────────────────
    let db = match connect_and_migrate(&app_cfg.database.connection_url()).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

    // ── Pipeline services ──────────────────────────────────────
    let metrics = Arc::new(PipelineMetrics::new());
    let tracker = Arc::new(ChangeTracker::new());

    let cost_service = Arc::new(CostService::new(
        repos.clone(),
        tracker.clone(),
        tz,
        app_cfg.pricing.default_cost_per_kwh,
    ));

    let ledger_generator = Arc::new(LedgerGenerator::new(
        repos.clone(),
        cost_service.clone(),
        metrics.clone(),
        tracker.clone(),
        LedgerConfig::from(&app_cfg.pipeline),
        tz,
    ));

    let ingestor = Arc::new(TelemetryIngestor::new(
        repos.clone(),
        metrics.clone(),
        ledger_generator.clone(),
    ));

    let aggregation = Arc::new(AggregationService::new(
        repos.clone(),
        cost_service.clone(),
        metrics.clone(),
        tracker.clone(),
        tz,
        app_cfg.pipeline.aggregation_grace_secs,
    ));

    let health = HealthService::new(repos.clone(), metrics.clone());

    // Records persisted before a crash may never have reached the
    // generator; sweep them in before new telemetry arrives.
    match ingestor.replay_unprocessed(10_000).await {
        Ok(0) => {}
        Ok(replayed) => info!("Replayed {} stranded telemetry records", replayed),
        Err(e) => warn!("Replay of stranded telemetry failed: {}", e),
    }

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.listen_for_signals();

    // ── Background jobs ────────────────────────────────────────
    let reconciliation = ReconciliationJob::new(
        repos.clone(),
        ledger_generator.clone(),
        aggregation.clone(),
        metrics.clone(),
    )
    .with_config(ReconciliationConfig::from(&app_cfg.reconciliation));
    reconciliation.start(shutdown_signal.clone());

    let scheduler = AggregationScheduler::new(
        repos.clone(),
        aggregation.clone(),
        tracker.clone(),
        SchedulerConfig::from(&app_cfg.aggregation),
    );
    scheduler.start(shutdown_signal.clone());

    info!("🚀 Pipeline running. Press Ctrl+C to shutdown gracefully.");

    // The transport layer (outside this crate) feeds `ingestor` and
    // queries `aggregation`; this process idles until shutdown, then
    // drains within the configured grace period.
    shutdown
        .finish(async {
            match health.report().await {
                Ok(report) => info!(
                    "Final stats: {} events ({} unprocessed), {} ledger entries, {} resets, {} errors",
                    report.total_events,
                    report.unprocessed_events,
                    report.ledger_entries,
                    report.resets_detected,
                    report.errors
                ),
                Err(e) => warn!("Could not assemble final health report: {}", e),
            }

            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("✅ Database connection closed");
            }
        })
        .await;

    info!("👋 AutoVolt energy accounting service shutdown complete");
    Ok(())
}
