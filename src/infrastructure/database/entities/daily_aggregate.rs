//! Daily aggregate entity
//!
//! Derived rollup, keyed uniquely by (device_id, date); upserted on
//! recomputation, never hand-edited.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_aggregates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_id: String,

    pub classroom: Option<String>,

    /// Local date "YYYY-MM-DD" in the facility timezone
    pub date: String,

    pub total_wh: f64,

    /// Seconds any switch was ON inside the day
    pub on_time_secs: i64,

    /// Cost at calculation time (re-priced on every recomputation)
    pub cost_inr: f64,

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
