//! Telemetry record entity
//!
//! Stored verbatim for audit and replay; immutable except for the
//! `processed` flag.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "telemetry_records")]
pub struct Model {
    /// Record UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub device_id: String,

    pub logical_name: Option<String>,

    pub classroom: Option<String>,

    /// Device-reported sample time
    pub timestamp: DateTime<Utc>,

    /// "measured" | "estimated"
    pub reading_kind: String,

    /// Cumulative meter counter (Wh) when the board has a meter
    pub energy_wh: Option<f64>,

    /// Instantaneous power (W), if reported
    pub power_w: Option<f64>,

    /// Per-switch samples (JSON map)
    pub switches: Json,

    /// Device-reported status string
    pub status: Option<String>,

    /// Verbatim transport payload
    pub raw_payload: Json,

    /// Whether the ledger generator has consumed this record
    pub processed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
