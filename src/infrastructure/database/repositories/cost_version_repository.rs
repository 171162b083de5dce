//! SeaORM implementation of CostVersionRepository
//!
//! Version creation is a compare-and-close inside one transaction:
//! overlap check, closing the open version and inserting the new one
//! either all land or none do, so two concurrent creations can never
//! leave two open versions for a scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::db_err;
use crate::domain::costing::{CostScope, CostVersion, CostVersionRepository, NewCostVersion};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::cost_version;

pub struct SeaOrmCostVersionRepository {
    db: DatabaseConnection,
}

impl SeaOrmCostVersionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: cost_version::Model) -> CostVersion {
    CostVersion {
        id: m.id,
        scope: CostScope::from_str(&m.scope).unwrap_or(CostScope::Global),
        classroom: m.classroom,
        cost_per_kwh: m.cost_per_kwh,
        effective_from: m.effective_from,
        effective_until: m.effective_until,
        notes: m.notes,
        created_at: m.created_at,
    }
}

fn scope_label(scope: CostScope, classroom: Option<&str>) -> String {
    match (scope, classroom) {
        (CostScope::Classroom, Some(c)) => format!("classroom:{}", c),
        _ => scope.as_str().to_string(),
    }
}

fn scope_filter(scope: CostScope, classroom: Option<&str>) -> sea_orm::Select<cost_version::Entity> {
    let query = cost_version::Entity::find().filter(cost_version::Column::Scope.eq(scope.as_str()));
    match classroom {
        Some(c) => query.filter(cost_version::Column::Classroom.eq(c)),
        None => query.filter(cost_version::Column::Classroom.is_null()),
    }
}

// ── CostVersionRepository impl ──────────────────────────────────

#[async_trait]
impl CostVersionRepository for SeaOrmCostVersionRepository {
    async fn create_version(&self, new: NewCostVersion) -> DomainResult<CostVersion> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let classroom = new.classroom.as_deref();

        let existing = scope_filter(new.scope, classroom)
            .all(&txn)
            .await
            .map_err(db_err)?;

        let mut open_to_close: Option<cost_version::Model> = None;
        for model in existing {
            let version = model_to_domain(model.clone());
            let conflicting = if version.is_open() {
                if version.effective_from < new.effective_from {
                    open_to_close = Some(model);
                    false
                } else {
                    true
                }
            } else {
                version.overlaps(new.effective_from, None)
            };

            if conflicting {
                // transaction dropped here → rollback, no partial state
                return Err(DomainError::Overlap {
                    scope: scope_label(new.scope, classroom),
                    conflict_from: version.effective_from,
                    conflict_until: version.effective_until,
                });
            }
        }

        if let Some(open) = open_to_close {
            let mut model: cost_version::ActiveModel = open.into();
            model.effective_until = Set(Some(new.effective_from));
            model.update(&txn).await.map_err(db_err)?;
        }

        let inserted = cost_version::ActiveModel {
            id: Default::default(),
            scope: Set(new.scope.as_str().to_string()),
            classroom: Set(new.classroom),
            cost_per_kwh: Set(new.cost_per_kwh),
            effective_from: Set(new.effective_from),
            effective_until: Set(None),
            notes: Set(new.notes),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(model_to_domain(inserted))
    }

    async fn find_effective(
        &self,
        scope: CostScope,
        classroom: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<CostVersion>> {
        let model = scope_filter(scope, classroom)
            .filter(cost_version::Column::EffectiveFrom.lte(at))
            .filter(
                sea_orm::Condition::any()
                    .add(cost_version::Column::EffectiveUntil.is_null())
                    .add(cost_version::Column::EffectiveUntil.gt(at)),
            )
            .order_by_desc(cost_version::Column::EffectiveFrom)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn list_all(&self) -> DomainResult<Vec<CostVersion>> {
        let models = cost_version::Entity::find()
            .order_by_asc(cost_version::Column::EffectiveFrom)
            .order_by_asc(cost_version::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
