//! Telemetry ingestor
//!
//! Boundary between the transport layer and the accounting pipeline.
//! Validates minimal shape, persists accepted records verbatim for
//! audit/replay, refreshes the device registry and hands the record to
//! the ledger generator in-process. Malformed input is discarded —
//! counted and logged, never surfaced to the caller as an error.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::application::metrics::PipelineMetrics;
use crate::application::services::ledger_generator::LedgerGenerator;
use crate::domain::{Device, DomainResult, RepositoryProvider, TelemetryRecord};

/// What happened to one submitted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted { entries_created: usize },
    Discarded,
}

/// Ingest-side statistics for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub total_events: i64,
    pub unprocessed_events: i64,
    pub events_last_hour: i64,
    pub online_devices: i64,
}

pub struct TelemetryIngestor {
    repos: Arc<dyn RepositoryProvider>,
    metrics: Arc<PipelineMetrics>,
    ledger: Arc<LedgerGenerator>,
}

impl TelemetryIngestor {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        metrics: Arc<PipelineMetrics>,
        ledger: Arc<LedgerGenerator>,
    ) -> Self {
        Self {
            repos,
            metrics,
            ledger,
        }
    }

    /// Accept one normalized record from the transport layer.
    pub async fn ingest(&self, record: TelemetryRecord) -> DomainResult<IngestOutcome> {
        if !record.is_identifiable() {
            self.metrics.record_discarded();
            warn!(
                device_id = record.device_id.as_str(),
                timestamp = %record.timestamp,
                "Discarding unidentifiable telemetry record"
            );
            return Ok(IngestOutcome::Discarded);
        }

        self.repos.telemetry().save(record.clone()).await?;
        self.metrics.record_ingested();

        let mut device = self
            .repos
            .devices()
            .find_by_id(&record.device_id)
            .await?
            .unwrap_or_else(|| Device::new(&record.device_id));
        device.observe(&record);
        self.repos.devices().upsert(device).await?;

        // Same-process hand-off. A failure here is a per-device problem;
        // the record stays persisted and unprocessed for a later replay
        // sweep, and the caller is never blocked.
        match self.ledger.process_record(&record).await {
            Ok(entries_created) => {
                debug!(
                    device_id = record.device_id.as_str(),
                    entries_created, "Telemetry processed"
                );
                Ok(IngestOutcome::Accepted { entries_created })
            }
            Err(e) => {
                self.metrics.record_error();
                warn!(
                    device_id = record.device_id.as_str(),
                    error = %e,
                    "Ledger processing failed; record kept for replay"
                );
                Ok(IngestOutcome::Accepted { entries_created: 0 })
            }
        }
    }

    /// Re-feed records that were persisted but never processed (e.g.
    /// the process died between save and hand-off). Safe to re-run.
    pub async fn replay_unprocessed(&self, limit: u64) -> DomainResult<usize> {
        let pending = self.repos.telemetry().list_unprocessed(limit).await?;
        let mut replayed = 0;
        for record in &pending {
            match self.ledger.process_record(record).await {
                Ok(_) => replayed += 1,
                Err(e) if e.is_transient() => {
                    // The store itself is struggling; retrying the rest
                    // of the batch now would only pile on. Next sweep
                    // picks up where this one stopped.
                    self.metrics.record_error();
                    warn!(error = %e, "Replay aborted on transient failure");
                    break;
                }
                Err(e) => {
                    self.metrics.record_error();
                    warn!(
                        device_id = record.device_id.as_str(),
                        record_id = %record.id,
                        error = %e,
                        "Replay of unprocessed record failed"
                    );
                }
            }
        }
        Ok(replayed)
    }

    pub async fn stats(&self) -> DomainResult<IngestStats> {
        let now = Utc::now();
        Ok(IngestStats {
            total_events: self.repos.telemetry().count_all().await?,
            unprocessed_events: self.repos.telemetry().count_unprocessed().await?,
            events_last_hour: self.repos.telemetry().count_since(now - Duration::hours(1)).await?,
            online_devices: self.repos.devices().count_online().await?,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::cost_service::CostService;
    use crate::application::services::ledger_generator::LedgerConfig;
    use crate::application::tracker::ChangeTracker;
    use crate::domain::{EnergyReading, SwitchSample};
    use crate::infrastructure::storage::InMemoryProvider;
    use chrono::{DateTime, TimeZone};
    use std::collections::BTreeMap;

    fn rig() -> (Arc<InMemoryProvider>, Arc<PipelineMetrics>, TelemetryIngestor) {
        let repos: Arc<InMemoryProvider> = Arc::new(InMemoryProvider::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let tracker = Arc::new(ChangeTracker::new());
        let cost = Arc::new(CostService::new(
            repos.clone(),
            tracker.clone(),
            chrono_tz::Asia::Kolkata,
            7.5,
        ));
        let generator = Arc::new(LedgerGenerator::new(
            repos.clone(),
            cost,
            metrics.clone(),
            tracker,
            LedgerConfig {
                flush_interval_secs: 0,
                ..LedgerConfig::default()
            },
            chrono_tz::Asia::Kolkata,
        ));
        let ingestor = TelemetryIngestor::new(repos.clone(), metrics.clone(), generator);
        (repos, metrics, ingestor)
    }

    fn record(at: DateTime<Utc>, state: bool) -> TelemetryRecord {
        let mut switches = BTreeMap::new();
        switches.insert(
            "1".to_string(),
            SwitchSample {
                name: "Fan 1".to_string(),
                state,
                power_rating_w: Some(75.0),
            },
        );
        let mut rec = TelemetryRecord::new("esp32-a1b2c3", at, EnergyReading::Estimated, switches);
        rec.classroom = Some("Lab1".to_string());
        rec
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[tokio::test]
    async fn malformed_record_is_discarded_not_errored() {
        let (repos, metrics, ingestor) = rig();
        let mut rec = record(ts(0), true);
        rec.device_id = "".to_string();

        let outcome = ingestor.ingest(rec).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Discarded);
        assert_eq!(metrics.events_discarded(), 1);
        assert_eq!(metrics.events_ingested(), 0);

        use crate::domain::RepositoryProvider;
        assert_eq!(repos.telemetry().count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn accepted_record_is_persisted_and_processed() {
        use crate::domain::RepositoryProvider;
        let (repos, metrics, ingestor) = rig();

        ingestor.ingest(record(ts(0), true)).await.unwrap();
        let outcome = ingestor.ingest(record(ts(60), false)).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Accepted { entries_created: 1 });
        assert_eq!(metrics.events_ingested(), 2);

        assert_eq!(repos.telemetry().count_all().await.unwrap(), 2);
        assert_eq!(repos.telemetry().count_unprocessed().await.unwrap(), 0);
        assert_eq!(repos.ledger().count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn registry_row_is_refreshed_on_ingest() {
        use crate::domain::RepositoryProvider;
        let (repos, _metrics, ingestor) = rig();

        ingestor.ingest(record(ts(0), true)).await.unwrap();

        let device = repos
            .devices()
            .find_by_id("esp32-a1b2c3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.classroom.as_deref(), Some("Lab1"));
        assert_eq!(device.rated_power_w("1"), Some(75.0));
        assert_eq!(device.last_seen, Some(ts(0)));
    }

    #[tokio::test]
    async fn stats_reflect_counts() {
        let (_repos, _metrics, ingestor) = rig();
        // use recent timestamps so events_last_hour catches them
        let now = Utc::now();
        ingestor.ingest(record(now - Duration::minutes(5), true)).await.unwrap();
        ingestor.ingest(record(now - Duration::minutes(4), true)).await.unwrap();

        let stats = ingestor.stats().await.unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.unprocessed_events, 0);
        assert_eq!(stats.events_last_hour, 2);
        assert_eq!(stats.online_devices, 1);
    }

    #[tokio::test]
    async fn replay_sweep_processes_stranded_records() {
        use crate::domain::RepositoryProvider;
        let (repos, _metrics, ingestor) = rig();

        // stranded: saved but never handed to the generator
        repos.telemetry().save(record(ts(0), true)).await.unwrap();
        repos.telemetry().save(record(ts(60), false)).await.unwrap();
        assert_eq!(repos.telemetry().count_unprocessed().await.unwrap(), 2);

        let replayed = ingestor.replay_unprocessed(100).await.unwrap();
        assert_eq!(replayed, 2);
        assert_eq!(repos.telemetry().count_unprocessed().await.unwrap(), 0);
        assert_eq!(repos.ledger().count_all().await.unwrap(), 1);
    }
}
