//! Reconciliation sweep
//!
//! Runs in the background and compares each device's expected heartbeat
//! cadence against the last telemetry seen. Devices past the threshold
//! are marked offline; switches left ON across the unmonitored gap get
//! a low-confidence estimated ledger entry, and every touched day is
//! re-aggregated.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::application::metrics::PipelineMetrics;
use crate::application::services::aggregation::AggregationService;
use crate::application::services::ledger_generator::LedgerGenerator;
use crate::config::ReconciliationSection;
use crate::domain::{DeviceStatus, DomainResult, RepositoryProvider};
use crate::shared::shutdown::ShutdownSignal;

/// Configuration for the reconciliation sweep
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// How often the sweep runs (in seconds)
    pub check_interval_secs: u64,
    /// How long without telemetry before a device is considered offline
    pub offline_after_secs: i64,
    /// Whether to back-fill estimated entries for gaps
    pub gap_fill: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            offline_after_secs: 180, // 3 missed 60 s heartbeats
            gap_fill: true,
        }
    }
}

impl From<&ReconciliationSection> for ReconciliationConfig {
    fn from(section: &ReconciliationSection) -> Self {
        Self {
            check_interval_secs: section.check_interval_secs,
            offline_after_secs: section.offline_after_secs,
            gap_fill: section.gap_fill,
        }
    }
}

/// What one sweep did
#[derive(Debug, Default, Clone)]
pub struct ReconcileOutcome {
    pub devices_checked: usize,
    pub devices_flagged_offline: usize,
    pub gap_entries_created: usize,
    pub days_reaggregated: usize,
}

/// Reconciliation job
///
/// Started once at boot; keeps running until shutdown.
pub struct ReconciliationJob {
    repos: Arc<dyn RepositoryProvider>,
    ledger: Arc<LedgerGenerator>,
    aggregation: Arc<AggregationService>,
    metrics: Arc<PipelineMetrics>,
    config: ReconciliationConfig,
    running: Arc<RwLock<bool>>,
}

impl ReconciliationJob {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        ledger: Arc<LedgerGenerator>,
        aggregation: Arc<AggregationService>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            repos,
            ledger,
            aggregation,
            metrics,
            config: ReconciliationConfig::default(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_config(mut self, config: ReconciliationConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the background sweep task
    pub fn start(&self, shutdown: ShutdownSignal) {
        let repos = self.repos.clone();
        let ledger = self.ledger.clone();
        let aggregation = self.aggregation.clone();
        let metrics = self.metrics.clone();
        let config = self.config.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            {
                let mut r = running.write().await;
                *r = true;
            }

            info!(
                "🔎 Reconciliation sweep started (interval: {}s, offline threshold: {}s)",
                config.check_interval_secs, config.offline_after_secs
            );

            let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_secs));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match run_sweep(&repos, &ledger, &aggregation, &metrics, &config).await {
                            Ok(outcome) => {
                                if outcome.devices_flagged_offline > 0 || outcome.gap_entries_created > 0 {
                                    info!(
                                        checked = outcome.devices_checked,
                                        flagged = outcome.devices_flagged_offline,
                                        gap_entries = outcome.gap_entries_created,
                                        days = outcome.days_reaggregated,
                                        "Reconciliation sweep finished"
                                    );
                                }
                            }
                            Err(e) => {
                                metrics.record_error();
                                warn!("Reconciliation sweep error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.wait() => {
                        info!("🔎 Reconciliation sweep shutting down");
                        break;
                    }
                }
            }

            {
                let mut r = running.write().await;
                *r = false;
            }

            info!("🔎 Reconciliation sweep stopped");
        });
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run a single sweep immediately (also used by the tests).
    pub async fn run_once(&self) -> DomainResult<ReconcileOutcome> {
        run_sweep(
            &self.repos,
            &self.ledger,
            &self.aggregation,
            &self.metrics,
            &self.config,
        )
        .await
    }
}

async fn run_sweep(
    repos: &Arc<dyn RepositoryProvider>,
    ledger: &Arc<LedgerGenerator>,
    aggregation: &Arc<AggregationService>,
    metrics: &Arc<PipelineMetrics>,
    config: &ReconciliationConfig,
) -> DomainResult<ReconcileOutcome> {
    let now = Utc::now();
    let devices = repos.devices().list_all().await?;
    let mut outcome = ReconcileOutcome::default();
    let mut touched: BTreeSet<(String, NaiveDate)> = BTreeSet::new();

    for device in devices {
        outcome.devices_checked += 1;
        let Some(gap) = device.seconds_since_seen(now) else {
            continue; // never heard from; nothing to reconcile
        };
        if gap <= config.offline_after_secs {
            continue;
        }

        if device.status != DeviceStatus::Offline {
            info!(
                device_id = device.device_id.as_str(),
                gap_secs = gap,
                "Device missed heartbeats; marking offline"
            );
            match repos
                .devices()
                .update_status(&device.device_id, DeviceStatus::Offline)
                .await
            {
                Ok(()) => outcome.devices_flagged_offline += 1,
                Err(e) => {
                    metrics.record_error();
                    warn!(
                        device_id = device.device_id.as_str(),
                        error = %e,
                        "Failed to flag device offline"
                    );
                }
            }
        }

        if config.gap_fill {
            match ledger.fill_gaps_for_device(&device, now).await {
                Ok(entries) => {
                    outcome.gap_entries_created += entries.len();
                    for entry in &entries {
                        if let Some(classroom) = entry.classroom.clone() {
                            touched.insert((classroom.clone(), aggregation.local_date_of(entry.start_ts)));
                            touched.insert((classroom, aggregation.local_date_of(entry.end_ts)));
                        }
                    }
                }
                Err(e) => {
                    metrics.record_error();
                    warn!(
                        device_id = device.device_id.as_str(),
                        error = %e,
                        "Gap fill failed"
                    );
                }
            }
        }
    }

    for (classroom, date) in touched {
        match aggregation.re_aggregate_classroom(&classroom, date, date).await {
            Ok(_) => outcome.days_reaggregated += 1,
            Err(e) => {
                metrics.record_error();
                warn!(
                    classroom = classroom.as_str(),
                    date = %date,
                    error = %e,
                    "Re-aggregation after gap fill failed"
                );
            }
        }
    }

    Ok(outcome)
}

// ── Tests ──────────────────────────────────────────────────────
