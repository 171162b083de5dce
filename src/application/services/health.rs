//! Pipeline health reporting

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::metrics::PipelineMetrics;
use crate::domain::{DomainResult, RepositoryProvider};

/// Snapshot answered to the monitoring surface
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub total_events: i64,
    pub unprocessed_events: i64,
    pub online_devices: i64,
    pub ledger_entries: i64,
    pub ledger_entries_created: u64,
    pub resets_detected: u64,
    pub discarded_events: u64,
    pub duplicate_entries: u64,
    pub out_of_order_events: u64,
    pub errors: u64,
    pub last_aggregation_run: Option<DateTime<Utc>>,
}

pub struct HealthService {
    repos: Arc<dyn RepositoryProvider>,
    metrics: Arc<PipelineMetrics>,
}

impl HealthService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { repos, metrics }
    }

    pub async fn report(&self) -> DomainResult<HealthReport> {
        Ok(HealthReport {
            total_events: self.repos.telemetry().count_all().await?,
            unprocessed_events: self.repos.telemetry().count_unprocessed().await?,
            online_devices: self.repos.devices().count_online().await?,
            ledger_entries: self.repos.ledger().count_all().await?,
            ledger_entries_created: self.metrics.ledger_entries_created(),
            resets_detected: self.metrics.resets_detected(),
            discarded_events: self.metrics.events_discarded(),
            duplicate_entries: self.metrics.duplicate_entries(),
            out_of_order_events: self.metrics.out_of_order_events(),
            errors: self.metrics.errors(),
            last_aggregation_run: self.metrics.last_aggregation_run(),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────
