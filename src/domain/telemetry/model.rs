//! Telemetry domain entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a record reports energy.
///
/// Devices with a hardware meter publish a cumulative Wh counter;
/// relay-only boards publish nothing and their consumption is estimated
/// from switch state and rated power. The distinction is made once here
/// instead of branching on field presence downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnergyReading {
    /// Cumulative energy counter in Wh, plus optional instantaneous power.
    Measured {
        energy_wh: f64,
        power_w: Option<f64>,
    },
    /// No meter on board; consumption is estimated from switch duration.
    Estimated,
}

impl EnergyReading {
    pub fn counter_wh(&self) -> Option<f64> {
        match self {
            Self::Measured { energy_wh, .. } => Some(*energy_wh),
            Self::Estimated => None,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured { .. })
    }
}

/// State of one relay channel as reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchSample {
    /// Human-readable name (e.g. "Fan 1", "Projector")
    pub name: String,
    /// true = ON
    pub state: bool,
    /// Rated power of the connected appliance in W, if configured
    pub power_rating_w: Option<f64>,
}

/// A normalized telemetry record handed over by the transport layer.
///
/// Immutable once stored; only the `processed` flag may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Device ID (e.g. the board's MAC-derived identifier)
    pub device_id: String,
    /// Logical device name assigned in the dashboard
    pub logical_name: Option<String>,
    /// Classroom the device is installed in
    pub classroom: Option<String>,
    /// Device-reported sample time
    pub timestamp: DateTime<Utc>,
    /// Measured counter or estimation marker
    pub reading: EnergyReading,
    /// Per-switch samples, keyed by switch ID ("1".."6" on stock boards)
    pub switches: BTreeMap<String, SwitchSample>,
    /// Device-reported status string (e.g. "online")
    pub status: Option<String>,
    /// Verbatim copy of the transport payload, kept for audit/replay
    pub raw_payload: serde_json::Value,
    /// Whether the ledger generator has consumed this record
    pub processed: bool,
}

impl TelemetryRecord {
    pub fn new(
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        reading: EnergyReading,
        switches: BTreeMap<String, SwitchSample>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            logical_name: None,
            classroom: None,
            timestamp,
            reading,
            switches,
            status: None,
            raw_payload: serde_json::Value::Null,
            processed: false,
        }
    }

    /// Minimal shape check performed at the ingestion boundary.
    ///
    /// Records failing this are discarded (counted, logged), never
    /// propagated as errors to the transport.
    pub fn is_identifiable(&self) -> bool {
        !self.device_id.trim().is_empty() && self.timestamp.timestamp() > 0
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> TelemetryRecord {
        let mut switches = BTreeMap::new();
        switches.insert(
            "1".to_string(),
            SwitchSample {
                name: "Fan 1".to_string(),
                state: true,
                power_rating_w: Some(75.0),
            },
        );
        TelemetryRecord::new(
            "esp32-a1b2c3",
            Utc.with_ymd_and_hms(2026, 1, 10, 9, 30, 0).unwrap(),
            EnergyReading::Measured {
                energy_wh: 1500.0,
                power_w: Some(120.0),
            },
            switches,
        )
    }

    #[test]
    fn new_record_is_unprocessed() {
        let rec = sample_record();
        assert!(!rec.processed);
        assert!(rec.is_identifiable());
        assert_eq!(rec.reading.counter_wh(), Some(1500.0));
    }

    #[test]
    fn blank_device_id_is_not_identifiable() {
        let mut rec = sample_record();
        rec.device_id = "   ".to_string();
        assert!(!rec.is_identifiable());
    }

    #[test]
    fn epoch_zero_timestamp_is_not_identifiable() {
        let mut rec = sample_record();
        rec.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        assert!(!rec.is_identifiable());
    }

    #[test]
    fn estimated_reading_has_no_counter() {
        let mut rec = sample_record();
        rec.reading = EnergyReading::Estimated;
        assert_eq!(rec.reading.counter_wh(), None);
        assert!(!rec.reading.is_measured());
    }
}
