//! SeaORM implementation of DeviceRepository

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::db_err;
use crate::domain::device::{Device, DeviceRepository, DeviceStatus};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::device;

pub struct SeaOrmDeviceRepository {
    db: DatabaseConnection,
}

impl SeaOrmDeviceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: device::Model) -> Device {
    let switch_ratings: BTreeMap<String, f64> =
        serde_json::from_value(m.switch_ratings).unwrap_or_default();
    Device {
        device_id: m.device_id,
        logical_name: m.logical_name,
        classroom: m.classroom,
        switch_ratings,
        status: DeviceStatus::from_str(&m.status).unwrap_or(DeviceStatus::Unknown),
        last_seen: m.last_seen,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn domain_to_active(d: &Device) -> device::ActiveModel {
    device::ActiveModel {
        device_id: Set(d.device_id.clone()),
        logical_name: Set(d.logical_name.clone()),
        classroom: Set(d.classroom.clone()),
        switch_ratings: Set(serde_json::json!(d.switch_ratings)),
        status: Set(d.status.as_str().to_string()),
        last_seen: Set(d.last_seen),
        created_at: Set(d.created_at),
        updated_at: Set(d.updated_at),
    }
}

// ── DeviceRepository impl ───────────────────────────────────────

#[async_trait]
impl DeviceRepository for SeaOrmDeviceRepository {
    async fn upsert(&self, dev: Device) -> DomainResult<()> {
        let existing = device::Entity::find_by_id(&dev.device_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let mut model = domain_to_active(&dev);
        match existing {
            Some(row) => {
                model.created_at = Set(row.created_at);
                model.update(&self.db).await.map_err(db_err)?;
            }
            None => {
                model.insert(&self.db).await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, device_id: &str) -> DomainResult<Option<Device>> {
        let model = device::Entity::find_by_id(device_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn list_all(&self) -> DomainResult<Vec<Device>> {
        let models = device::Entity::find()
            .order_by_asc(device::Column::DeviceId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list_for_classroom(&self, classroom: &str) -> DomainResult<Vec<Device>> {
        let models = device::Entity::find()
            .filter(device::Column::Classroom.eq(classroom))
            .order_by_asc(device::Column::DeviceId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn update_status(&self, device_id: &str, status: DeviceStatus) -> DomainResult<()> {
        let existing = device::Entity::find_by_id(device_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Device",
                field: "device_id",
                value: device_id.to_string(),
            });
        };

        let mut model: device::ActiveModel = existing.into();
        model.status = Set(status.as_str().to_string());
        model.updated_at = Set(Utc::now());
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn count_online(&self) -> DomainResult<i64> {
        let count = device::Entity::find()
            .filter(device::Column::Status.eq(DeviceStatus::Online.as_str()))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count as i64)
    }

    async fn list_classrooms(&self) -> DomainResult<Vec<String>> {
        let classrooms: Vec<Option<String>> = device::Entity::find()
            .select_only()
            .column(device::Column::Classroom)
            .distinct()
            .order_by_asc(device::Column::Classroom)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(classrooms.into_iter().flatten().collect())
    }
}
