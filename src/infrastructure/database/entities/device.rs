//! Device registry entity

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registry row for one relay board
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    /// Board identifier (MAC-derived on stock firmware)
    #[sea_orm(primary_key, auto_increment = false)]
    pub device_id: String,

    /// Dashboard-assigned name
    pub logical_name: Option<String>,

    /// Classroom the board is installed in
    pub classroom: Option<String>,

    /// Rated appliance power per switch ID (JSON map, W)
    pub switch_ratings: Json,

    /// "online" | "offline" | "unknown"
    pub status: String,

    /// Last telemetry timestamp
    pub last_seen: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
