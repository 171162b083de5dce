//! Cost version entity
//!
//! Versions are never deleted, only closed by setting effective_until,
//! so historical pricing stays reproducible.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// "global" | "classroom"
    pub scope: String,

    /// Set iff scope == "classroom"
    pub classroom: Option<String>,

    /// INR per kWh
    pub cost_per_kwh: f64,

    pub effective_from: DateTime<Utc>,

    /// NULL = open-ended
    pub effective_until: Option<DateTime<Utc>>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
