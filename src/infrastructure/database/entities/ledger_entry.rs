//! Ledger entry entity
//!
//! Append-only. The unique index over (device_id, switch_id, start_ts)
//! is the replay-protection backstop; duplicate inserts are dropped at
//! the database level.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub device_id: String,

    pub switch_id: String,

    pub switch_name: String,

    /// Classroom at creation time, denormalized for aggregation queries
    pub classroom: Option<String>,

    pub start_ts: DateTime<Utc>,

    pub end_ts: DateTime<Utc>,

    pub duration_seconds: i64,

    /// Energy consumed in the interval (Wh), never negative
    pub delta_wh: f64,

    /// Average (measured) or rated (estimated) power (W)
    pub power_w: f64,

    /// Switch state held during the interval
    pub switch_state: bool,

    /// "measured" | "estimated"
    pub method: String,

    /// "high" | "medium" | "low"
    pub confidence: String,

    /// Machine-readable tag, e.g. "counter-reset", "gap-fill"
    pub quality_reason: Option<String>,

    /// Price snapshot captured at creation (INR/kWh)
    pub cost_per_kwh: f64,

    /// Price snapshot captured at creation (INR)
    pub cost_inr: f64,

    /// Meter counter at end_ts, for restart recovery
    pub counter_end_wh: Option<f64>,

    /// Which processing run produced this entry (UUID)
    pub calc_run_id: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
