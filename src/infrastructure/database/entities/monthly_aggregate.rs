//! Monthly aggregate entity

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_aggregates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_id: String,

    pub classroom: Option<String>,

    /// "YYYY-MM"
    pub month: String,

    pub total_wh: f64,

    pub on_time_secs: i64,

    pub cost_inr: f64,

    /// One line per day (JSON array of {date, total_wh, cost_inr})
    pub daily_totals: Json,

    pub measured_entries: i64,

    pub estimated_entries: i64,

    pub gap_filled_entries: i64,

    /// Which recomputation pass produced this row (UUID)
    pub calc_run_id: String,

    pub calculated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
