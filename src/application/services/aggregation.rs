//! Aggregation engine
//!
//! Derives daily and monthly rollups from the immutable ledger. Day
//! boundaries are local midnight in the facility timezone; intervals
//! crossing midnight split pro-rata. Aggregates are upserted (replace,
//! never append) and fully recomputable: prices are re-resolved at
//! calculation time so retroactive cost corrections flow into totals
//! while the ledger keeps its at-creation snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::metrics::PipelineMetrics;
use crate::application::services::cost_service::CostService;
use crate::application::tracker::ChangeTracker;
use crate::domain::{
    DailyAggregate, DailySummary, DailyTotal, Device, DeviceDailyUsage, DomainError, DomainResult,
    MonthlyAggregate, MonthlySummary, QualitySummary, RepositoryProvider, TimelineBucket,
};

const MAX_TIMELINE_BUCKETS: i64 = 10_000;

/// Result of one classroom-day pass
#[derive(Debug, Default)]
pub struct DailyBatch {
    pub aggregates: Vec<DailyAggregate>,
    /// "device@date" keys that failed; the batch continues past them
    pub failed: Vec<String>,
}

/// Result of one classroom-month pass
#[derive(Debug, Default)]
pub struct MonthlyBatch {
    pub aggregates: Vec<MonthlyAggregate>,
    pub failed: Vec<String>,
}

/// Result of a bulk recomputation
#[derive(Debug, Default)]
pub struct RecalcOutcome {
    pub daily_regenerated: usize,
    pub monthly_regenerated: usize,
    pub failed_keys: Vec<String>,
}

pub struct AggregationService {
    repos: Arc<dyn RepositoryProvider>,
    cost: Arc<CostService>,
    metrics: Arc<PipelineMetrics>,
    tracker: Arc<ChangeTracker>,
    tz: Tz,
    /// Entries whose end_ts is younger than this stay out of aggregates
    /// until the next pass, so a row still being written is never read.
    grace_secs: i64,
}

impl AggregationService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        cost: Arc<CostService>,
        metrics: Arc<PipelineMetrics>,
        tracker: Arc<ChangeTracker>,
        tz: Tz,
        grace_secs: i64,
    ) -> Self {
        Self {
            repos,
            cost,
            metrics,
            tracker,
            tz,
            grace_secs,
        }
    }

    // ── Day bucketing ──────────────────────────────────────────

    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            // DST gap at midnight; fall back to the UTC wall time
            LocalResult::None => Utc.from_utc_datetime(&naive),
        }
    }

    pub fn local_day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.local_midnight(date),
            self.local_midnight(date + Duration::days(1)),
        )
    }

    pub fn local_date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    pub fn today_local(&self) -> NaiveDate {
        self.local_date_of(Utc::now())
    }

    // ── Daily ──────────────────────────────────────────────────

    /// Recompute one classroom-day, one aggregate per device.
    ///
    /// Idempotent: with unchanged ledger data, repeated calls produce
    /// identical totals (only calc_run_id/calculated_at differ).
    pub async fn aggregate_daily(&self, classroom: &str, date: NaiveDate) -> DomainResult<DailyBatch> {
        let run_id = Uuid::new_v4();
        let (day_start, day_end) = self.local_day_bounds(date);
        let cutoff = Utc::now() - Duration::seconds(self.grace_secs);
        let devices = self.repos.devices().list_for_classroom(classroom).await?;

        let mut batch = DailyBatch::default();
        for device in &devices {
            match self
                .aggregate_device_day(device, classroom, date, day_start, day_end, cutoff, run_id)
                .await
            {
                Ok(aggregate) => batch.aggregates.push(aggregate),
                Err(e) => {
                    self.metrics.record_error();
                    warn!(
                        device_id = device.device_id.as_str(),
                        date = %date,
                        error = %e,
                        "Daily aggregation failed for device"
                    );
                    batch.failed.push(format!("{}@{}", device.device_id, date));
                }
            }
        }

        self.tracker.clear_day(classroom, &date.to_string());
        self.metrics.mark_aggregation_run(Utc::now());
        Ok(batch)
    }

    #[allow(clippy::too_many_arguments)]
    async fn aggregate_device_day(
        &self,
        device: &Device,
        classroom: &str,
        date: NaiveDate,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        run_id: Uuid,
    ) -> DomainResult<DailyAggregate> {
        let entries = self
            .repos
            .ledger()
            .list_for_device_overlapping(&device.device_id, day_start, day_end)
            .await?;

        let mut total_wh = 0.0;
        let mut on_time_secs = 0i64;
        let mut cost_inr = 0.0;
        let mut quality = QualitySummary::default();

        for entry in entries.iter().filter(|e| e.end_ts <= cutoff) {
            let Some(portion) = entry.portion_within(day_start, day_end) else {
                continue;
            };
            let quote = self.cost.resolve(Some(classroom), entry.end_ts).await?;
            total_wh += portion.delta_wh;
            on_time_secs += portion.on_seconds;
            cost_inr += portion.delta_wh / 1000.0 * quote.cost_per_kwh;
            quality.record(entry);
        }

        let aggregate = DailyAggregate {
            device_id: device.device_id.clone(),
            classroom: Some(classroom.to_string()),
            date: date.to_string(),
            total_wh,
            on_time_secs,
            cost_inr,
            quality,
            calc_run_id: run_id,
            calculated_at: Utc::now(),
        };
        self.repos.aggregates().upsert_daily(aggregate.clone()).await?;
        Ok(aggregate)
    }

    // ── Monthly ────────────────────────────────────────────────

    /// Recompute one classroom-month. Refreshes every elapsed day of the
    /// month first, then rolls the dailies up, so the monthly total is
    /// the sum of its daily lines by construction.
    pub async fn aggregate_monthly(
        &self,
        classroom: &str,
        year: i32,
        month: u32,
    ) -> DomainResult<MonthlyBatch> {
        let days = month_days(year, month)?;
        let month_key = format!("{:04}-{:02}", year, month);
        let today = self.today_local();
        let run_id = Uuid::new_v4();

        let mut per_device: BTreeMap<String, Vec<DailyAggregate>> = BTreeMap::new();
        let mut batch = MonthlyBatch::default();

        for date in days.iter().filter(|d| **d <= today) {
            let daily = self.aggregate_daily(classroom, *date).await?;
            batch.failed.extend(daily.failed);
            for aggregate in daily.aggregates {
                per_device
                    .entry(aggregate.device_id.clone())
                    .or_default()
                    .push(aggregate);
            }
        }

        for (device_id, dailies) in per_device {
            let mut monthly = MonthlyAggregate {
                device_id: device_id.clone(),
                classroom: Some(classroom.to_string()),
                month: month_key.clone(),
                total_wh: 0.0,
                on_time_secs: 0,
                cost_inr: 0.0,
                daily_totals: Vec::with_capacity(dailies.len()),
                quality: QualitySummary::default(),
                calc_run_id: run_id,
                calculated_at: Utc::now(),
            };
            for daily in &dailies {
                monthly.total_wh += daily.total_wh;
                monthly.on_time_secs += daily.on_time_secs;
                monthly.cost_inr += daily.cost_inr;
                monthly.quality.measured_entries += daily.quality.measured_entries;
                monthly.quality.estimated_entries += daily.quality.estimated_entries;
                monthly.quality.gap_filled_entries += daily.quality.gap_filled_entries;
                monthly.daily_totals.push(DailyTotal {
                    date: daily.date.clone(),
                    total_wh: daily.total_wh,
                    cost_inr: daily.cost_inr,
                });
            }

            match self.repos.aggregates().upsert_monthly(monthly.clone()).await {
                Ok(()) => batch.aggregates.push(monthly),
                Err(e) => {
                    self.metrics.record_error();
                    warn!(
                        device_id = device_id.as_str(),
                        month = month_key.as_str(),
                        error = %e,
                        "Monthly aggregation failed for device"
                    );
                    batch.failed.push(format!("{}@{}", device_id, month_key));
                }
            }
        }

        self.metrics.mark_aggregation_run(Utc::now());
        Ok(batch)
    }

    // ── Bulk recompute ─────────────────────────────────────────

    /// Recompute a date range, e.g. after a retroactive price
    /// correction. Safe to re-run; partial progress is simply redone.
    pub async fn re_aggregate_classroom(
        &self,
        classroom: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<RecalcOutcome> {
        if end < start {
            return Err(DomainError::Validation(format!(
                "Range end {} before start {}",
                end, start
            )));
        }

        let mut outcome = RecalcOutcome::default();
        let mut months: Vec<(i32, u32)> = Vec::new();

        for date in start.iter_days().take_while(|d| *d <= end) {
            let batch = self.aggregate_daily(classroom, date).await?;
            outcome.daily_regenerated += batch.aggregates.len();
            outcome.failed_keys.extend(batch.failed);
            let key = (date.year(), date.month());
            if !months.contains(&key) {
                months.push(key);
            }
        }

        for (year, month) in months {
            let batch = self.aggregate_monthly(classroom, year, month).await?;
            outcome.monthly_regenerated += batch.aggregates.len();
            outcome.failed_keys.extend(batch.failed);
        }

        info!(
            classroom,
            start = %start,
            end = %end,
            daily = outcome.daily_regenerated,
            monthly = outcome.monthly_regenerated,
            failed = outcome.failed_keys.len(),
            "Re-aggregation completed"
        );
        Ok(outcome)
    }

    // ── Read side ──────────────────────────────────────────────

    /// Classroom daily summary; recomputes lazily when no cached
    /// aggregate exists or the day has been invalidated.
    pub async fn daily_summary(&self, classroom: &str, date: NaiveDate) -> DomainResult<DailySummary> {
        let date_key = date.to_string();
        let devices = self.repos.devices().list_for_classroom(classroom).await?;
        let mut aggregates = self
            .repos
            .aggregates()
            .list_daily_for_classroom(classroom, &date_key)
            .await?;

        if aggregates.len() < devices.len() || self.tracker.is_dirty(classroom, &date_key) {
            aggregates = self.aggregate_daily(classroom, date).await?.aggregates;
        }

        let mut summary = DailySummary {
            classroom: classroom.to_string(),
            date: date_key,
            total_kwh: 0.0,
            total_cost_inr: 0.0,
            on_time_hours: 0.0,
            devices: Vec::with_capacity(aggregates.len()),
        };
        for aggregate in &aggregates {
            summary.total_kwh += aggregate.total_kwh();
            summary.total_cost_inr += aggregate.cost_inr;
            summary.on_time_hours += aggregate.on_time_hours();
            summary.devices.push(DeviceDailyUsage {
                device_id: aggregate.device_id.clone(),
                total_kwh: aggregate.total_kwh(),
                cost_inr: aggregate.cost_inr,
                on_time_hours: aggregate.on_time_hours(),
            });
        }
        Ok(summary)
    }

    pub async fn monthly_summary(
        &self,
        classroom: &str,
        year: i32,
        month: u32,
    ) -> DomainResult<MonthlySummary> {
        let month_key = format!("{:04}-{:02}", year, month);
        let devices = self.repos.devices().list_for_classroom(classroom).await?;
        let mut aggregates = self
            .repos
            .aggregates()
            .list_monthly_for_classroom(classroom, &month_key)
            .await?;

        if aggregates.len() < devices.len() || self.tracker.is_month_dirty(classroom, &month_key) {
            aggregates = self.aggregate_monthly(classroom, year, month).await?.aggregates;
        }

        let mut total_kwh = 0.0;
        let mut total_cost_inr = 0.0;
        let mut by_date: BTreeMap<String, DailyTotal> = BTreeMap::new();
        for aggregate in &aggregates {
            total_kwh += aggregate.total_kwh();
            total_cost_inr += aggregate.cost_inr;
            for line in &aggregate.daily_totals {
                let slot = by_date.entry(line.date.clone()).or_insert_with(|| DailyTotal {
                    date: line.date.clone(),
                    total_wh: 0.0,
                    cost_inr: 0.0,
                });
                slot.total_wh += line.total_wh;
                slot.cost_inr += line.cost_inr;
            }
        }

        Ok(MonthlySummary {
            classroom: classroom.to_string(),
            month: month_key,
            total_kwh,
            total_cost_inr,
            daily_totals: by_date.into_values().collect(),
        })
    }

    /// Time-bucketed consumption series for dashboard charts.
    pub async fn timeline(
        &self,
        classroom: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_minutes: u32,
    ) -> DomainResult<Vec<TimelineBucket>> {
        if bucket_minutes == 0 {
            return Err(DomainError::Validation("bucket_minutes must be > 0".to_string()));
        }
        if end <= start {
            return Err(DomainError::Validation("empty timeline range".to_string()));
        }
        let width = Duration::minutes(bucket_minutes as i64);
        let bucket_count = ((end - start).num_minutes() + bucket_minutes as i64 - 1)
            / bucket_minutes as i64;
        if bucket_count > MAX_TIMELINE_BUCKETS {
            return Err(DomainError::Validation(format!(
                "timeline would need {} buckets (max {})",
                bucket_count, MAX_TIMELINE_BUCKETS
            )));
        }

        let mut buckets = Vec::with_capacity(bucket_count as usize);
        let mut cursor = start;
        while cursor < end {
            buckets.push(TimelineBucket {
                bucket_start: cursor,
                total_wh: 0.0,
                cost_inr: 0.0,
            });
            cursor += width;
        }

        let entries = self
            .repos
            .ledger()
            .list_overlapping(Some(classroom), start, end)
            .await?;
        for entry in &entries {
            let quote = self.cost.resolve(Some(classroom), entry.end_ts).await?;
            for bucket in buckets.iter_mut() {
                let bucket_end = (bucket.bucket_start + width).min(end);
                if let Some(portion) = entry.portion_within(bucket.bucket_start, bucket_end) {
                    bucket.total_wh += portion.delta_wh;
                    bucket.cost_inr += portion.delta_wh / 1000.0 * quote.cost_per_kwh;
                }
            }
        }
        Ok(buckets)
    }

    /// Raw immutable ledger rows as RFC-4180 CSV, for audit. Keeps the
    /// at-creation price snapshots.
    pub async fn export_ledger_csv(
        &self,
        classroom: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<String> {
        let entries = self
            .repos
            .ledger()
            .list_overlapping(Some(classroom), start, end)
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "device_id",
                "switch_id",
                "switch_name",
                "classroom",
                "start_ts",
                "end_ts",
                "duration_seconds",
                "delta_wh",
                "power_w",
                "switch_state",
                "method",
                "confidence",
                "quality_reason",
                "cost_per_kwh",
                "cost_inr",
                "calc_run_id",
            ])
            .map_err(csv_err)?;

        for entry in &entries {
            let row = [
                entry.device_id.clone(),
                entry.switch_id.clone(),
                entry.switch_name.clone(),
                entry.classroom.clone().unwrap_or_default(),
                entry.start_ts.to_rfc3339(),
                entry.end_ts.to_rfc3339(),
                entry.duration_seconds.to_string(),
                format!("{:.6}", entry.delta_wh),
                format!("{:.3}", entry.power_w),
                if entry.switch_state { "on" } else { "off" }.to_string(),
                entry.method.as_str().to_string(),
                entry.quality.confidence.as_str().to_string(),
                entry.quality.reason.clone().unwrap_or_default(),
                format!("{:.4}", entry.cost.cost_per_kwh),
                format!("{:.6}", entry.cost.cost_inr),
                entry.calc_run_id.to_string(),
            ];
            writer.write_record(&row).map_err(csv_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| DomainError::Validation(format!("CSV export failed: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| DomainError::Validation(format!("CSV export not UTF-8: {}", e)))
    }
}

fn csv_err(e: csv::Error) -> DomainError {
    DomainError::Validation(format!("CSV export failed: {}", e))
}

fn month_days(year: i32, month: u32) -> DomainResult<Vec<NaiveDate>> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Err(DomainError::Validation(format!(
            "Invalid month {:04}-{:02}",
            year, month
        )));
    };
    Ok(first
        .iter_days()
        .take_while(|d| d.month() == month && d.year() == year)
        .collect())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CostCalculation, CostScope, LedgerEntry, Method, NewCostVersion, Quality,
    };
    use crate::infrastructure::storage::InMemoryProvider;

    struct Rig {
        repos: Arc<InMemoryProvider>,
        tracker: Arc<ChangeTracker>,
        cost: Arc<CostService>,
        service: AggregationService,
    }

    fn rig() -> Rig {
        let repos: Arc<InMemoryProvider> = Arc::new(InMemoryProvider::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let tracker = Arc::new(ChangeTracker::new());
        let cost = Arc::new(CostService::new(
            repos.clone(),
            tracker.clone(),
            chrono_tz::UTC,
            7.5,
        ));
        let service = AggregationService::new(
            repos.clone(),
            cost.clone(),
            metrics,
            tracker.clone(),
            chrono_tz::UTC,
            30,
        );
        Rig {
            repos,
            tracker,
            cost,
            service,
        }
    }

    async fn seed_device(rig: &Rig, device_id: &str, classroom: &str) {
        let mut device = Device::new(device_id);
        device.classroom = Some(classroom.to_string());
        rig.repos.devices().upsert(device).await.unwrap();
    }

    fn entry(
        device_id: &str,
        classroom: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        delta_wh: f64,
    ) -> LedgerEntry {
        LedgerEntry {
            device_id: device_id.to_string(),
            switch_id: "1".to_string(),
            switch_name: "Fan 1".to_string(),
            classroom: Some(classroom.to_string()),
            start_ts: start,
            end_ts: end,
            duration_seconds: (end - start).num_seconds(),
            delta_wh,
            power_w: 75.0,
            switch_state: true,
            method: Method::Measured,
            quality: Quality::high(),
            cost: CostCalculation::price(delta_wh, 7.5),
            counter_end_wh: None,
            calc_run_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn midnight_crossing_interval_splits_between_days() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 22, 0),
                utc(2026, 1, 11, 2, 0),
                400.0,
            ))
            .await
            .unwrap();

        let day1 = rig.service.aggregate_daily("Lab1", date(2026, 1, 10)).await.unwrap();
        let day2 = rig.service.aggregate_daily("Lab1", date(2026, 1, 11)).await.unwrap();

        assert!((day1.aggregates[0].total_wh - 200.0).abs() < 1e-9);
        assert!((day2.aggregates[0].total_wh - 200.0).abs() < 1e-9);
        assert!(
            (day1.aggregates[0].total_wh + day2.aggregates[0].total_wh - 400.0).abs() < 1e-9
        );
        assert_eq!(day1.aggregates[0].on_time_secs, 2 * 3600);
    }

    #[tokio::test]
    async fn daily_aggregation_is_idempotent() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 9, 0),
                utc(2026, 1, 10, 10, 0),
                120.0,
            ))
            .await
            .unwrap();

        let first = rig.service.aggregate_daily("Lab1", date(2026, 1, 10)).await.unwrap();
        let second = rig.service.aggregate_daily("Lab1", date(2026, 1, 10)).await.unwrap();

        let a = &first.aggregates[0];
        let b = &second.aggregates[0];
        assert_eq!(a.total_wh, b.total_wh);
        assert_eq!(a.cost_inr, b.cost_inr);
        assert_eq!(a.on_time_secs, b.on_time_secs);
        // only bookkeeping differs
        assert_ne!(a.calc_run_id, b.calc_run_id);

        let stored = rig
            .repos
            .aggregates()
            .get_daily("dev-1", "2026-01-10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_wh, b.total_wh);
    }

    #[tokio::test]
    async fn monthly_total_equals_sum_of_daily_totals() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        for (day, delta) in [(5u32, 100.0), (6, 250.0), (7, 50.0)] {
            rig.repos
                .ledger()
                .insert(entry(
                    "dev-1",
                    "Lab1",
                    utc(2026, 1, day, 9, 0),
                    utc(2026, 1, day, 10, 0),
                    delta,
                ))
                .await
                .unwrap();
        }

        let batch = rig.service.aggregate_monthly("Lab1", 2026, 1).await.unwrap();
        assert_eq!(batch.aggregates.len(), 1);
        let monthly = &batch.aggregates[0];

        let daily_sum: f64 = monthly.daily_totals.iter().map(|d| d.total_wh).sum();
        assert!((daily_sum - monthly.total_wh).abs() < 1e-6);
        assert!((monthly.total_wh - 400.0).abs() < 1e-9);

        let stored = rig
            .repos
            .aggregates()
            .get_monthly("dev-1", "2026-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_wh, monthly.total_wh);
        assert_eq!(stored.daily_totals.len(), 3);

        let summary = rig.service.monthly_summary("Lab1", 2026, 1).await.unwrap();
        assert!((summary.total_kwh - 0.4).abs() < 1e-9);
        assert_eq!(summary.month, "2026-01");
    }

    #[tokio::test]
    async fn re_aggregation_reprices_after_cost_correction() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 20, 9, 0),
                utc(2026, 1, 20, 10, 0),
                1000.0,
            ))
            .await
            .unwrap();

        let before = rig.service.aggregate_daily("Lab1", date(2026, 1, 20)).await.unwrap();
        assert!((before.aggregates[0].cost_inr - 7.5).abs() < 1e-9);

        // retroactive correction: ₹9/kWh from Jan 1
        rig.cost
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 9.0,
                effective_from: utc(2026, 1, 1, 0, 0),
                notes: Some("tariff revision".to_string()),
            })
            .await
            .unwrap();

        let outcome = rig
            .service
            .re_aggregate_classroom("Lab1", date(2026, 1, 20), date(2026, 1, 20))
            .await
            .unwrap();
        assert_eq!(outcome.daily_regenerated, 1);
        assert_eq!(outcome.monthly_regenerated, 1);
        assert!(outcome.failed_keys.is_empty());

        let after = rig
            .repos
            .aggregates()
            .get_daily("dev-1", "2026-01-20")
            .await
            .unwrap()
            .unwrap();
        assert!((after.cost_inr - 9.0).abs() < 1e-9);

        // the ledger snapshot stays untouched
        let raw = rig
            .repos
            .ledger()
            .list_overlapping(Some("Lab1"), utc(2026, 1, 20, 0, 0), utc(2026, 1, 21, 0, 0))
            .await
            .unwrap();
        assert!((raw[0].cost.cost_inr - 7.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn grace_buffer_excludes_entries_still_settling() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        let now = Utc::now();

        // settled hours ago vs. finished just now
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                now - Duration::hours(3),
                now - Duration::hours(2),
                100.0,
            ))
            .await
            .unwrap();
        rig.repos
            .ledger()
            .insert(entry("dev-1", "Lab1", now - Duration::minutes(10), now, 500.0))
            .await
            .unwrap();

        let today = rig.service.today_local();
        let yesterday = today - Duration::days(1);
        let mut total = 0.0;
        for day in [yesterday, today] {
            for aggregate in rig.service.aggregate_daily("Lab1", day).await.unwrap().aggregates {
                total += aggregate.total_wh;
            }
        }
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn daily_summary_computes_lazily_and_honors_invalidation() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 9, 0),
                utc(2026, 1, 10, 10, 0),
                100.0,
            ))
            .await
            .unwrap();

        // nothing cached yet → computed on demand
        let summary = rig.service.daily_summary("Lab1", date(2026, 1, 10)).await.unwrap();
        assert!((summary.total_kwh - 0.1).abs() < 1e-9);
        assert_eq!(summary.devices.len(), 1);

        // new ledger data invalidates the cached day
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 11, 0),
                utc(2026, 1, 10, 12, 0),
                300.0,
            ))
            .await
            .unwrap();
        rig.tracker.mark_day("Lab1", "2026-01-10");

        let summary = rig.service.daily_summary("Lab1", date(2026, 1, 10)).await.unwrap();
        assert!((summary.total_kwh - 0.4).abs() < 1e-9);
        assert!((summary.on_time_hours - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn timeline_distributes_pro_rata_into_buckets() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 10, 0),
                utc(2026, 1, 10, 11, 0),
                60.0,
            ))
            .await
            .unwrap();

        let buckets = rig
            .service
            .timeline("Lab1", utc(2026, 1, 10, 10, 0), utc(2026, 1, 10, 11, 0), 30)
            .await
            .unwrap();
        assert_eq!(buckets.len(), 2);
        assert!((buckets[0].total_wh - 30.0).abs() < 1e-9);
        assert!((buckets[1].total_wh - 30.0).abs() < 1e-9);

        let total: f64 = buckets.iter().map(|b| b.total_wh).sum();
        assert!((total - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn timeline_rejects_degenerate_requests() {
        let rig = rig();
        assert!(rig
            .service
            .timeline("Lab1", utc(2026, 1, 10, 10, 0), utc(2026, 1, 10, 11, 0), 0)
            .await
            .is_err());
        assert!(rig
            .service
            .timeline("Lab1", utc(2026, 1, 10, 11, 0), utc(2026, 1, 10, 10, 0), 30)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn csv_export_carries_audit_columns() {
        let rig = rig();
        seed_device(&rig, "dev-1", "Lab1").await;
        rig.repos
            .ledger()
            .insert(entry(
                "dev-1",
                "Lab1",
                utc(2026, 1, 10, 9, 0),
                utc(2026, 1, 10, 10, 0),
                120.0,
            ))
            .await
            .unwrap();

        let csv = rig
            .service
            .export_ledger_csv("Lab1", utc(2026, 1, 10, 0, 0), utc(2026, 1, 11, 0, 0))
            .await
            .unwrap();

        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("device_id,switch_id,switch_name"));
        let row = lines.next().unwrap();
        assert!(row.contains("dev-1"));
        assert!(row.contains("measured"));
        assert!(row.contains("120.000000"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn month_days_covers_whole_month() {
        let days = month_days(2026, 2).unwrap();
        assert_eq!(days.len(), 28);
        assert_eq!(days[0], date(2026, 2, 1));
        assert_eq!(days[27], date(2026, 2, 28));
        assert!(month_days(2026, 13).is_err());
    }
}
