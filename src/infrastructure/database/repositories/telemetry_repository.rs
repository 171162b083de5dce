//! SeaORM implementation of TelemetryRepository

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::db_err;
use crate::domain::telemetry::{EnergyReading, SwitchSample, TelemetryRecord, TelemetryRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::telemetry_record;

pub struct SeaOrmTelemetryRepository {
    db: DatabaseConnection,
}

impl SeaOrmTelemetryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: telemetry_record::Model) -> TelemetryRecord {
    let reading = match m.reading_kind.as_str() {
        "measured" => EnergyReading::Measured {
            energy_wh: m.energy_wh.unwrap_or(0.0),
            power_w: m.power_w,
        },
        _ => EnergyReading::Estimated,
    };
    let switches: BTreeMap<String, SwitchSample> =
        serde_json::from_value(m.switches).unwrap_or_default();

    TelemetryRecord {
        id: Uuid::parse_str(&m.id).unwrap_or_else(|_| Uuid::nil()),
        device_id: m.device_id,
        logical_name: m.logical_name,
        classroom: m.classroom,
        timestamp: m.timestamp,
        reading,
        switches,
        status: m.status,
        raw_payload: m.raw_payload,
        processed: m.processed,
    }
}

fn domain_to_active(r: &TelemetryRecord) -> telemetry_record::ActiveModel {
    let (reading_kind, energy_wh, power_w) = match &r.reading {
        EnergyReading::Measured { energy_wh, power_w } => {
            ("measured", Some(*energy_wh), *power_w)
        }
        EnergyReading::Estimated => ("estimated", None, None),
    };

    telemetry_record::ActiveModel {
        id: Set(r.id.to_string()),
        device_id: Set(r.device_id.clone()),
        logical_name: Set(r.logical_name.clone()),
        classroom: Set(r.classroom.clone()),
        timestamp: Set(r.timestamp),
        reading_kind: Set(reading_kind.to_string()),
        energy_wh: Set(energy_wh),
        power_w: Set(power_w),
        switches: Set(serde_json::json!(r.switches)),
        status: Set(r.status.clone()),
        raw_payload: Set(r.raw_payload.clone()),
        processed: Set(r.processed),
    }
}

// ── TelemetryRepository impl ────────────────────────────────────

#[async_trait]
impl TelemetryRepository for SeaOrmTelemetryRepository {
    async fn save(&self, record: TelemetryRecord) -> DomainResult<()> {
        domain_to_active(&record)
            .insert(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TelemetryRecord>> {
        let model = telemetry_record::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn mark_processed(&self, ids: &[Uuid]) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        telemetry_record::Entity::update_many()
            .col_expr(telemetry_record::Column::Processed, Expr::value(true))
            .filter(telemetry_record::Column::Id.is_in(keys))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_unprocessed(&self, limit: u64) -> DomainResult<Vec<TelemetryRecord>> {
        let models = telemetry_record::Entity::find()
            .filter(telemetry_record::Column::Processed.eq(false))
            .order_by_asc(telemetry_record::Column::Timestamp)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn count_all(&self) -> DomainResult<i64> {
        let count = telemetry_record::Entity::find()
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count as i64)
    }

    async fn count_unprocessed(&self) -> DomainResult<i64> {
        let count = telemetry_record::Entity::find()
            .filter(telemetry_record::Column::Processed.eq(false))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count as i64)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> DomainResult<i64> {
        let count = telemetry_record::Entity::find()
            .filter(telemetry_record::Column::Timestamp.gte(since))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count as i64)
    }
}
