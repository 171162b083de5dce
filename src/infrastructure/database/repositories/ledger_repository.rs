//! SeaORM implementation of LedgerRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::db_err;
use crate::domain::ledger::{
    Confidence, CostCalculation, LedgerEntry, LedgerRepository, Method, Quality,
};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::ledger_entry;

pub struct SeaOrmLedgerRepository {
    db: DatabaseConnection,
}

impl SeaOrmLedgerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: ledger_entry::Model) -> LedgerEntry {
    LedgerEntry {
        device_id: m.device_id,
        switch_id: m.switch_id,
        switch_name: m.switch_name,
        classroom: m.classroom,
        start_ts: m.start_ts,
        end_ts: m.end_ts,
        duration_seconds: m.duration_seconds,
        delta_wh: m.delta_wh,
        power_w: m.power_w,
        switch_state: m.switch_state,
        method: Method::from_str(&m.method).unwrap_or(Method::Estimated),
        quality: Quality {
            confidence: Confidence::from_str(&m.confidence).unwrap_or(Confidence::Low),
            reason: m.quality_reason,
        },
        cost: CostCalculation {
            cost_per_kwh: m.cost_per_kwh,
            cost_inr: m.cost_inr,
        },
        counter_end_wh: m.counter_end_wh,
        calc_run_id: Uuid::parse_str(&m.calc_run_id).unwrap_or_else(|_| Uuid::nil()),
        created_at: m.created_at,
    }
}

fn domain_to_active(e: &LedgerEntry) -> ledger_entry::ActiveModel {
    ledger_entry::ActiveModel {
        id: Default::default(),
        device_id: Set(e.device_id.clone()),
        switch_id: Set(e.switch_id.clone()),
        switch_name: Set(e.switch_name.clone()),
        classroom: Set(e.classroom.clone()),
        start_ts: Set(e.start_ts),
        end_ts: Set(e.end_ts),
        duration_seconds: Set(e.duration_seconds),
        delta_wh: Set(e.delta_wh),
        power_w: Set(e.power_w),
        switch_state: Set(e.switch_state),
        method: Set(e.method.as_str().to_string()),
        confidence: Set(e.quality.confidence.as_str().to_string()),
        quality_reason: Set(e.quality.reason.clone()),
        cost_per_kwh: Set(e.cost.cost_per_kwh),
        cost_inr: Set(e.cost.cost_inr),
        counter_end_wh: Set(e.counter_end_wh),
        calc_run_id: Set(e.calc_run_id.to_string()),
        created_at: Set(e.created_at),
    }
}

/// [start_ts, end_ts) intersects [from, until), including zero-length
/// entries sitting inside the window.
fn window_condition(from: DateTime<Utc>, until: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(ledger_entry::Column::StartTs.lt(until))
                .add(ledger_entry::Column::EndTs.gt(from)),
        )
        .add(
            Condition::all()
                .add(ledger_entry::Column::DurationSeconds.eq(0))
                .add(ledger_entry::Column::StartTs.gte(from))
                .add(ledger_entry::Column::StartTs.lt(until)),
        )
}

// ── LedgerRepository impl ───────────────────────────────────────

#[async_trait]
impl LedgerRepository for SeaOrmLedgerRepository {
    async fn insert(&self, entry: LedgerEntry) -> DomainResult<bool> {
        let result = ledger_entry::Entity::insert(domain_to_active(&entry))
            .on_conflict(
                OnConflict::columns([
                    ledger_entry::Column::DeviceId,
                    ledger_entry::Column::SwitchId,
                    ledger_entry::Column::StartTs,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(&self.db)
            .await;

        match result {
            Ok(_) => Ok(true),
            // conflict hit the uniqueness key: replayed interval, no-op
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn last_entry_for_switch(
        &self,
        device_id: &str,
        switch_id: &str,
    ) -> DomainResult<Option<LedgerEntry>> {
        let model = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::DeviceId.eq(device_id))
            .filter(ledger_entry::Column::SwitchId.eq(switch_id))
            .order_by_desc(ledger_entry::Column::EndTs)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn switch_ids_for_device(&self, device_id: &str) -> DomainResult<Vec<String>> {
        let ids: Vec<String> = ledger_entry::Entity::find()
            .select_only()
            .column(ledger_entry::Column::SwitchId)
            .filter(ledger_entry::Column::DeviceId.eq(device_id))
            .distinct()
            .order_by_asc(ledger_entry::Column::SwitchId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(ids)
    }

    async fn list_overlapping(
        &self,
        classroom: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let mut query = ledger_entry::Entity::find().filter(window_condition(from, until));
        if let Some(classroom) = classroom {
            query = query.filter(ledger_entry::Column::Classroom.eq(classroom));
        }
        let models = query
            .order_by_asc(ledger_entry::Column::StartTs)
            .order_by_asc(ledger_entry::Column::DeviceId)
            .order_by_asc(ledger_entry::Column::SwitchId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list_for_device_overlapping(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>> {
        let models = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::DeviceId.eq(device_id))
            .filter(window_condition(from, until))
            .order_by_asc(ledger_entry::Column::StartTs)
            .order_by_asc(ledger_entry::Column::SwitchId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn count_all(&self) -> DomainResult<i64> {
        let count = ledger_entry::Entity::find()
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count as i64)
    }
}
