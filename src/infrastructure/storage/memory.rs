//! In-memory storage implementation
//!
//! Backs every repository trait with process-local maps. Used by the
//! test suite and for development without a database file. The cost
//! version table sits behind a mutex so compare-and-close creation is
//! atomic, mirroring the transactional SQL implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{
    AggregateRepository, CostScope, CostVersion, CostVersionRepository, DailyAggregate, Device,
    DeviceRepository, DeviceStatus, DomainError, DomainResult, LedgerEntry, LedgerKey,
    LedgerRepository, MonthlyAggregate, NewCostVersion, RepositoryProvider, TelemetryRecord,
    TelemetryRepository,
};

struct CostTable {
    versions: Vec<CostVersion>,
    next_id: i32,
}

/// In-memory repository provider for development and testing
pub struct InMemoryProvider {
    devices: DashMap<String, Device>,
    telemetry: DashMap<Uuid, TelemetryRecord>,
    ledger: DashMap<LedgerKey, LedgerEntry>,
    cost_versions: Mutex<CostTable>,
    daily: DashMap<(String, String), DailyAggregate>,
    monthly: DashMap<(String, String), MonthlyAggregate>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            telemetry: DashMap::new(),
            ledger: DashMap::new(),
            cost_versions: Mutex::new(CostTable {
                versions: Vec::new(),
                next_id: 1,
            }),
            daily: DashMap::new(),
            monthly: DashMap::new(),
        }
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryProvider {
    fn devices(&self) -> &dyn DeviceRepository {
        self
    }

    fn telemetry(&self) -> &dyn TelemetryRepository {
        self
    }

    fn ledger(&self) -> &dyn LedgerRepository {
        self
    }

    fn cost_versions(&self) -> &dyn CostVersionRepository {
        self
    }

    fn aggregates(&self) -> &dyn AggregateRepository {
        self
    }
}

fn scope_label(scope: CostScope, classroom: Option<&str>) -> String {
    match (scope, classroom) {
        (CostScope::Classroom, Some(c)) => format!("classroom:{}", c),
        _ => scope.as_str().to_string(),
    }
}

#[async_trait]
impl DeviceRepository for InMemoryProvider {
    async fn upsert(&self, device: Device) -> DomainResult<()> {
        self.devices.insert(device.device_id.clone(), device);
        Ok(())
    }

    async fn find_by_id(&self, device_id: &str) -> DomainResult<Option<Device>> {
        Ok(self.devices.get(device_id).map(|d| d.clone()))
    }

    async fn list_all(&self) -> DomainResult<Vec<Device>> {
        Ok(self.devices.iter().map(|d| d.value().clone()).collect())
    }

    async fn list_for_classroom(&self, classroom: &str) -> DomainResult<Vec<Device>> {
        Ok(self
            .devices
            .iter()
            .filter(|d| d.classroom.as_deref() == Some(classroom))
            .map(|d| d.value().clone())
            .collect())
    }

    async fn update_status(&self, device_id: &str, status: DeviceStatus) -> DomainResult<()> {
        if let Some(mut dev) = self.devices.get_mut(device_id) {
            dev.status = status;
            dev.updated_at = Utc::now();
            Ok(())
        } else {
            Err(DomainError::NotFound {
                entity: "Device",
                field: "device_id",
                value: device_id.to_string(),
            })
        }
    }

    async fn count_online(&self) -> DomainResult<i64> {
        Ok(self
            .devices
            .iter()
            .filter(|d| d.status == DeviceStatus::Online)
            .count() as i64)
    }

    async fn list_classrooms(&self) -> DomainResult<Vec<String>> {
        let mut classrooms: Vec<String> = self
            .devices
            .iter()
            .filter_map(|d| d.classroom.clone())
            .collect();
        classrooms.sort();
        classrooms.dedup();
        Ok(classrooms)
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryProvider {
    async fn save(&self, record: TelemetryRecord) -> DomainResult<()> {
        self.telemetry.insert(record.id, record);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TelemetryRecord>> {
        Ok(self.telemetry.get(&id).map(|r| r.clone()))
    }

    async fn mark_processed(&self, ids: &[Uuid]) -> DomainResult<()> {
        for id in ids {
            if let Some(mut rec) = self.telemetry.get_mut(id) {
                rec.processed = true;
            }
        }
        Ok(())
    }

    async fn list_unprocessed(&self, limit: u64) -> DomainResult<Vec<TelemetryRecord>> {
        let mut records: Vec<TelemetryRecord> = self
            .telemetry
            .iter()
            .filter(|r| !r.processed)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn count_all(&self) -> DomainResult<i64> {
        Ok(self.telemetry.len() as i64)
    }

    async fn count_unprocessed(&self) -> DomainResult<i64> {
        Ok(self.telemetry.iter().filter(|r| !r.processed).count() as i64)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> DomainResult<i64> {
        Ok(self
            .telemetry
            .iter()
            .filter(|r| r.timestamp >= since)
            .count() as i64)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryProvider {
    async fn insert(&self, entry: LedgerEntry) -> DomainResult<bool> {
        match self.ledger.entry(entry.key()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(true)
            }
        }
    }

    async fn last_entry_for_switch(
        &self,
        device_id: &str,
        switch_id: &str,
    ) -> DomainResult<Option<LedgerEntry>> {
        Ok(self
            .ledger
            .iter()
            .filter(|e| e.device_id == device_id && e.switch_id == switch_id)
            .max_by_key(|e| e.end_ts)
            .map(|e| e.value().clone()))
    }

    async fn switch_ids_for_device(&self, device_id: &str) -> DomainResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .ledger
            .iter()
            .filter(|e| e.device_id == device_id)
            .map(|e| e.switch_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn list_overlapping(
        &self,
        classroom: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|e| e.overlaps(from, until))
            .filter(|e| match classroom {
                Some(c) => e.classroom.as_deref() == Some(c),
                None => true,
            })
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.start_ts, e.device_id.clone(), e.switch_id.clone()));
        Ok(entries)
    }

    async fn list_for_device_overlapping(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|e| e.device_id == device_id && e.overlaps(from, until))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.start_ts, e.switch_id.clone()));
        Ok(entries)
    }

    async fn count_all(&self) -> DomainResult<i64> {
        Ok(self.ledger.len() as i64)
    }
}

#[async_trait]
impl CostVersionRepository for InMemoryProvider {
    async fn create_version(&self, new: NewCostVersion) -> DomainResult<CostVersion> {
        let mut table = self
            .cost_versions
            .lock()
            .map_err(|_| DomainError::Validation("cost version table lock poisoned".to_string()))?;

        let classroom = new.classroom.as_deref();
        for v in table.versions.iter() {
            if !v.same_scope(new.scope, classroom) {
                continue;
            }
            let conflicting = if v.is_open() {
                // The open version is closed below, unless the new start
                // does not come strictly after it.
                v.effective_from >= new.effective_from
            } else {
                v.overlaps(new.effective_from, None)
            };
            if conflicting {
                return Err(DomainError::Overlap {
                    scope: scope_label(new.scope, classroom),
                    conflict_from: v.effective_from,
                    conflict_until: v.effective_until,
                });
            }
        }

        for v in table.versions.iter_mut() {
            if v.same_scope(new.scope, classroom) && v.is_open() {
                v.effective_until = Some(new.effective_from);
            }
        }

        let id = table.next_id;
        table.next_id += 1;
        let version = CostVersion {
            id,
            scope: new.scope,
            classroom: new.classroom,
            cost_per_kwh: new.cost_per_kwh,
            effective_from: new.effective_from,
            effective_until: None,
            notes: new.notes,
            created_at: Utc::now(),
        };
        table.versions.push(version.clone());
        Ok(version)
    }

    async fn find_effective(
        &self,
        scope: CostScope,
        classroom: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<CostVersion>> {
        let table = self
            .cost_versions
            .lock()
            .map_err(|_| DomainError::Validation("cost version table lock poisoned".to_string()))?;
        Ok(table
            .versions
            .iter()
            .filter(|v| v.same_scope(scope, classroom) && v.contains(at))
            .max_by_key(|v| v.effective_from)
            .cloned())
    }

    async fn list_all(&self) -> DomainResult<Vec<CostVersion>> {
        let table = self
            .cost_versions
            .lock()
            .map_err(|_| DomainError::Validation("cost version table lock poisoned".to_string()))?;
        let mut versions = table.versions.clone();
        versions.sort_by_key(|v| (v.effective_from, v.id));
        Ok(versions)
    }
}

#[async_trait]
impl AggregateRepository for InMemoryProvider {
    async fn upsert_daily(&self, aggregate: DailyAggregate) -> DomainResult<()> {
        self.daily.insert(
            (aggregate.device_id.clone(), aggregate.date.clone()),
            aggregate,
        );
        Ok(())
    }

    async fn get_daily(&self, device_id: &str, date: &str) -> DomainResult<Option<DailyAggregate>> {
        Ok(self
            .daily
            .get(&(device_id.to_string(), date.to_string()))
            .map(|a| a.clone()))
    }

    async fn list_daily_for_classroom(
        &self,
        classroom: &str,
        date: &str,
    ) -> DomainResult<Vec<DailyAggregate>> {
        let mut aggregates: Vec<DailyAggregate> = self
            .daily
            .iter()
            .filter(|a| a.classroom.as_deref() == Some(classroom) && a.date == date)
            .map(|a| a.value().clone())
            .collect();
        aggregates.sort_by_key(|a| a.device_id.clone());
        Ok(aggregates)
    }

    async fn list_daily_for_device_range(
        &self,
        device_id: &str,
        from: &str,
        until: &str,
    ) -> DomainResult<Vec<DailyAggregate>> {
        let mut aggregates: Vec<DailyAggregate> = self
            .daily
            .iter()
            .filter(|a| {
                a.device_id == device_id && a.date.as_str() >= from && a.date.as_str() <= until
            })
            .map(|a| a.value().clone())
            .collect();
        aggregates.sort_by_key(|a| a.date.clone());
        Ok(aggregates)
    }

    async fn upsert_monthly(&self, aggregate: MonthlyAggregate) -> DomainResult<()> {
        self.monthly.insert(
            (aggregate.device_id.clone(), aggregate.month.clone()),
            aggregate,
        );
        Ok(())
    }

    async fn get_monthly(
        &self,
        device_id: &str,
        month: &str,
    ) -> DomainResult<Option<MonthlyAggregate>> {
        Ok(self
            .monthly
            .get(&(device_id.to_string(), month.to_string()))
            .map(|a| a.clone()))
    }

    async fn list_monthly_for_classroom(
        &self,
        classroom: &str,
        month: &str,
    ) -> DomainResult<Vec<MonthlyAggregate>> {
        let mut aggregates: Vec<MonthlyAggregate> = self
            .monthly
            .iter()
            .filter(|a| a.classroom.as_deref() == Some(classroom) && a.month == month)
            .map(|a| a.value().clone())
            .collect();
        aggregates.sort_by_key(|a| a.device_id.clone());
        Ok(aggregates)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{CostCalculation, Method, Quality};
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, h, m, 0).unwrap()
    }

    fn entry(start: DateTime<Utc>, end: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            device_id: "esp32-a1b2c3".to_string(),
            switch_id: "1".to_string(),
            switch_name: "Fan 1".to_string(),
            classroom: Some("Lab1".to_string()),
            start_ts: start,
            end_ts: end,
            duration_seconds: (end - start).num_seconds(),
            delta_wh: 50.0,
            power_w: 50.0,
            switch_state: true,
            method: Method::Measured,
            quality: Quality::high(),
            cost: CostCalculation::price(50.0, 7.5),
            counter_end_wh: Some(1050.0),
            calc_run_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_ledger_insert_is_a_noop() {
        let store = InMemoryProvider::new();
        let e = entry(ts(8, 0), ts(9, 0));

        assert!(store.ledger().insert(e.clone()).await.unwrap());
        let mut replay = e.clone();
        replay.delta_wh = 999.0;
        assert!(!store.ledger().insert(replay).await.unwrap());

        let kept = store
            .last_entry_for_switch("esp32-a1b2c3", "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.delta_wh, 50.0);
        assert_eq!(store.ledger().count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn last_entry_picks_latest_end() {
        let store = InMemoryProvider::new();
        store.ledger().insert(entry(ts(8, 0), ts(9, 0))).await.unwrap();
        store.ledger().insert(entry(ts(9, 0), ts(10, 0))).await.unwrap();

        let last = store
            .last_entry_for_switch("esp32-a1b2c3", "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.end_ts, ts(10, 0));
    }

    #[tokio::test]
    async fn list_overlapping_filters_classroom_and_window() {
        let store = InMemoryProvider::new();
        store.ledger().insert(entry(ts(8, 0), ts(9, 0))).await.unwrap();
        let mut other = entry(ts(8, 0), ts(9, 0));
        other.device_id = "esp32-d4e5f6".to_string();
        other.classroom = Some("Lab2".to_string());
        store.ledger().insert(other).await.unwrap();

        let lab1 = store
            .list_overlapping(Some("Lab1"), ts(0, 0), ts(23, 0))
            .await
            .unwrap();
        assert_eq!(lab1.len(), 1);
        assert_eq!(lab1[0].device_id, "esp32-a1b2c3");

        let all = store
            .list_overlapping(None, ts(0, 0), ts(23, 0))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let none = store
            .list_overlapping(Some("Lab1"), ts(10, 0), ts(11, 0))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn creating_version_closes_prior_open_version() {
        let store = InMemoryProvider::new();
        let jan1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let feb1 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        store
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 7.0,
                effective_from: jan1,
                notes: None,
            })
            .await
            .unwrap();
        store
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 7.5,
                effective_from: feb1,
                notes: None,
            })
            .await
            .unwrap();

        let versions = store.cost_versions().list_all().await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].effective_until, Some(feb1));
        assert!(versions[1].is_open());

        let open_count = versions.iter().filter(|v| v.is_open()).count();
        assert_eq!(open_count, 1);
    }

    #[tokio::test]
    async fn version_not_after_open_start_is_rejected() {
        let store = InMemoryProvider::new();
        let feb1 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let jan1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        store
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 7.0,
                effective_from: feb1,
                notes: None,
            })
            .await
            .unwrap();

        let err = store
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 8.0,
                effective_from: jan1,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Overlap { .. }));

        // No partial state: still exactly one version, still open.
        let versions = store.cost_versions().list_all().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions[0].is_open());
    }

    #[tokio::test]
    async fn classroom_scope_versions_do_not_disturb_global() {
        let store = InMemoryProvider::new();
        let jan1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let jan15 = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();

        store
            .create_version(NewCostVersion {
                scope: CostScope::Global,
                classroom: None,
                cost_per_kwh: 7.0,
                effective_from: jan1,
                notes: None,
            })
            .await
            .unwrap();
        store
            .create_version(NewCostVersion {
                scope: CostScope::Classroom,
                classroom: Some("Lab1".to_string()),
                cost_per_kwh: 8.0,
                effective_from: jan15,
                notes: None,
            })
            .await
            .unwrap();

        let global = store
            .find_effective(CostScope::Global, None, jan15)
            .await
            .unwrap()
            .unwrap();
        assert!(global.is_open());
        assert_eq!(global.cost_per_kwh, 7.0);

        let lab1 = store
            .find_effective(CostScope::Classroom, Some("Lab1"), jan15)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lab1.cost_per_kwh, 8.0);

        let lab2 = store
            .find_effective(CostScope::Classroom, Some("Lab2"), jan15)
            .await
            .unwrap();
        assert!(lab2.is_none());
    }

    #[tokio::test]
    async fn mark_processed_flips_flag_only() {
        let store = InMemoryProvider::new();
        let rec = TelemetryRecord::new(
            "esp32-a1b2c3",
            ts(9, 0),
            crate::domain::EnergyReading::Estimated,
            Default::default(),
        );
        let id = rec.id;
        store.telemetry().save(rec).await.unwrap();
        assert_eq!(store.telemetry().count_unprocessed().await.unwrap(), 1);

        store.telemetry().mark_processed(&[id]).await.unwrap();
        assert_eq!(store.telemetry().count_unprocessed().await.unwrap(), 0);
        assert_eq!(store.telemetry().count_all().await.unwrap(), 1);
        assert!(store.telemetry().find_by_id(id).await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn daily_upsert_replaces() {
        let store = InMemoryProvider::new();
        let mut agg = DailyAggregate {
            device_id: "esp32-a1b2c3".to_string(),
            classroom: Some("Lab1".to_string()),
            date: "2026-01-10".to_string(),
            total_wh: 100.0,
            on_time_secs: 3600,
            cost_inr: 0.75,
            quality: Default::default(),
            calc_run_id: Uuid::new_v4(),
            calculated_at: Utc::now(),
        };
        store.aggregates().upsert_daily(agg.clone()).await.unwrap();
        agg.total_wh = 150.0;
        store.aggregates().upsert_daily(agg).await.unwrap();

        let stored = store
            .get_daily("esp32-a1b2c3", "2026-01-10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_wh, 150.0);
        assert_eq!(
            store
                .list_daily_for_classroom("Lab1", "2026-01-10")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn daily_range_query_is_inclusive_and_ordered() {
        let store = InMemoryProvider::new();
        for (date, wh) in [("2026-01-09", 10.0), ("2026-01-10", 20.0), ("2026-01-11", 30.0)] {
            store
                .aggregates()
                .upsert_daily(DailyAggregate {
                    device_id: "esp32-a1b2c3".to_string(),
                    classroom: Some("Lab1".to_string()),
                    date: date.to_string(),
                    total_wh: wh,
                    on_time_secs: 0,
                    cost_inr: 0.0,
                    quality: Default::default(),
                    calc_run_id: Uuid::new_v4(),
                    calculated_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let range = store
            .list_daily_for_device_range("esp32-a1b2c3", "2026-01-09", "2026-01-10")
            .await
            .unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].date, "2026-01-09");
        assert_eq!(range[1].date, "2026-01-10");
    }
}
