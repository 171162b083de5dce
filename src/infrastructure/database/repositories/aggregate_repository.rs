//! SeaORM implementation of AggregateRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::db_err;
use crate::domain::aggregate::{
    AggregateRepository, DailyAggregate, DailyTotal, MonthlyAggregate, QualitySummary,
};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::{daily_aggregate, monthly_aggregate};

pub struct SeaOrmAggregateRepository {
    db: DatabaseConnection,
}

impl SeaOrmAggregateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn daily_to_domain(m: daily_aggregate::Model) -> DailyAggregate {
    DailyAggregate {
        device_id: m.device_id,
        classroom: m.classroom,
        date: m.date,
        total_wh: m.total_wh,
        on_time_secs: m.on_time_secs,
        cost_inr: m.cost_inr,
        quality: QualitySummary {
            measured_entries: m.measured_entries,
            estimated_entries: m.estimated_entries,
            gap_filled_entries: m.gap_filled_entries,
        },
        calc_run_id: Uuid::parse_str(&m.calc_run_id).unwrap_or_else(|_| Uuid::nil()),
        calculated_at: m.calculated_at,
    }
}

fn monthly_to_domain(m: monthly_aggregate::Model) -> MonthlyAggregate {
    let daily_totals: Vec<DailyTotal> = serde_json::from_value(m.daily_totals).unwrap_or_default();
    MonthlyAggregate {
        device_id: m.device_id,
        classroom: m.classroom,
        month: m.month,
        total_wh: m.total_wh,
        on_time_secs: m.on_time_secs,
        cost_inr: m.cost_inr,
        daily_totals,
        quality: QualitySummary {
            measured_entries: m.measured_entries,
            estimated_entries: m.estimated_entries,
            gap_filled_entries: m.gap_filled_entries,
        },
        calc_run_id: Uuid::parse_str(&m.calc_run_id).unwrap_or_else(|_| Uuid::nil()),
        calculated_at: m.calculated_at,
    }
}

// ── AggregateRepository impl ────────────────────────────────────

#[async_trait]
impl AggregateRepository for SeaOrmAggregateRepository {
    async fn upsert_daily(&self, aggregate: DailyAggregate) -> DomainResult<()> {
        let existing = daily_aggregate::Entity::find()
            .filter(daily_aggregate::Column::DeviceId.eq(aggregate.device_id.as_str()))
            .filter(daily_aggregate::Column::Date.eq(aggregate.date.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let mut model = daily_aggregate::ActiveModel {
            id: Default::default(),
            device_id: Set(aggregate.device_id),
            classroom: Set(aggregate.classroom),
            date: Set(aggregate.date),
            total_wh: Set(aggregate.total_wh),
            on_time_secs: Set(aggregate.on_time_secs),
            cost_inr: Set(aggregate.cost_inr),
            measured_entries: Set(aggregate.quality.measured_entries),
            estimated_entries: Set(aggregate.quality.estimated_entries),
            gap_filled_entries: Set(aggregate.quality.gap_filled_entries),
            calc_run_id: Set(aggregate.calc_run_id.to_string()),
            calculated_at: Set(aggregate.calculated_at),
        };

        match existing {
            Some(row) => {
                model.id = Set(row.id);
                model.update(&self.db).await.map_err(db_err)?;
            }
            None => {
                model.insert(&self.db).await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn get_daily(&self, device_id: &str, date: &str) -> DomainResult<Option<DailyAggregate>> {
        let model = daily_aggregate::Entity::find()
            .filter(daily_aggregate::Column::DeviceId.eq(device_id))
            .filter(daily_aggregate::Column::Date.eq(date))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(daily_to_domain))
    }

    async fn list_daily_for_classroom(
        &self,
        classroom: &str,
        date: &str,
    ) -> DomainResult<Vec<DailyAggregate>> {
        let models = daily_aggregate::Entity::find()
            .filter(daily_aggregate::Column::Classroom.eq(classroom))
            .filter(daily_aggregate::Column::Date.eq(date))
            .order_by_asc(daily_aggregate::Column::DeviceId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(daily_to_domain).collect())
    }

    async fn list_daily_for_device_range(
        &self,
        device_id: &str,
        from: &str,
        until: &str,
    ) -> DomainResult<Vec<DailyAggregate>> {
        let models = daily_aggregate::Entity::find()
            .filter(daily_aggregate::Column::DeviceId.eq(device_id))
            .filter(daily_aggregate::Column::Date.gte(from))
            .filter(daily_aggregate::Column::Date.lte(until))
            .order_by_asc(daily_aggregate::Column::Date)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(daily_to_domain).collect())
    }

    async fn upsert_monthly(&self, aggregate: MonthlyAggregate) -> DomainResult<()> {
        let existing = monthly_aggregate::Entity::find()
            .filter(monthly_aggregate::Column::DeviceId.eq(aggregate.device_id.as_str()))
            .filter(monthly_aggregate::Column::Month.eq(aggregate.month.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let mut model = monthly_aggregate::ActiveModel {
            id: Default::default(),
            device_id: Set(aggregate.device_id),
            classroom: Set(aggregate.classroom),
            month: Set(aggregate.month),
            total_wh: Set(aggregate.total_wh),
            on_time_secs: Set(aggregate.on_time_secs),
            cost_inr: Set(aggregate.cost_inr),
            daily_totals: Set(serde_json::json!(aggregate.daily_totals)),
            measured_entries: Set(aggregate.quality.measured_entries),
            estimated_entries: Set(aggregate.quality.estimated_entries),
            gap_filled_entries: Set(aggregate.quality.gap_filled_entries),
            calc_run_id: Set(aggregate.calc_run_id.to_string()),
            calculated_at: Set(aggregate.calculated_at),
        };

        match existing {
            Some(row) => {
                model.id = Set(row.id);
                model.update(&self.db).await.map_err(db_err)?;
            }
            None => {
                model.insert(&self.db).await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn get_monthly(
        &self,
        device_id: &str,
        month: &str,
    ) -> DomainResult<Option<MonthlyAggregate>> {
        let model = monthly_aggregate::Entity::find()
            .filter(monthly_aggregate::Column::DeviceId.eq(device_id))
            .filter(monthly_aggregate::Column::Month.eq(month))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(monthly_to_domain))
    }

    async fn list_monthly_for_classroom(
        &self,
        classroom: &str,
        month: &str,
    ) -> DomainResult<Vec<MonthlyAggregate>> {
        let models = monthly_aggregate::Entity::find()
            .filter(monthly_aggregate::Column::Classroom.eq(classroom))
            .filter(monthly_aggregate::Column::Month.eq(month))
            .order_by_asc(monthly_aggregate::Column::DeviceId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(monthly_to_domain).collect())
    }
}
