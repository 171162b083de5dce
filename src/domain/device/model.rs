//! Device registry entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::telemetry::TelemetryRecord;

/// Device connectivity status as judged by the reconciliation sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry row for one relay board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub logical_name: Option<String>,
    pub classroom: Option<String>,
    /// Rated appliance power per switch ID, W
    pub switch_ratings: BTreeMap<String, f64>,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn new(device_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            device_id: device_id.into(),
            logical_name: None,
            classroom: None,
            switch_ratings: BTreeMap::new(),
            status: DeviceStatus::Unknown,
            last_seen: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh the row from an accepted telemetry record.
    pub fn observe(&mut self, record: &TelemetryRecord) {
        if record.logical_name.is_some() {
            self.logical_name = record.logical_name.clone();
        }
        if record.classroom.is_some() {
            self.classroom = record.classroom.clone();
        }
        for (switch_id, sample) in &record.switches {
            if let Some(rating) = sample.power_rating_w {
                self.switch_ratings.insert(switch_id.clone(), rating);
            }
        }
        self.last_seen = Some(match self.last_seen {
            Some(prev) => prev.max(record.timestamp),
            None => record.timestamp,
        });
        self.status = DeviceStatus::Online;
        self.updated_at = Utc::now();
    }

    /// Seconds since the device was last heard from.
    pub fn seconds_since_seen(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_seen.map(|seen| (now - seen).num_seconds())
    }

    pub fn rated_power_w(&self, switch_id: &str) -> Option<f64> {
        self.switch_ratings.get(switch_id).copied()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{EnergyReading, SwitchSample};
    use chrono::TimeZone;

    fn record(ts: DateTime<Utc>) -> TelemetryRecord {
        let mut switches = BTreeMap::new();
        switches.insert(
            "1".to_string(),
            SwitchSample {
                name: "Fan 1".to_string(),
                state: true,
                power_rating_w: Some(75.0),
            },
        );
        let mut rec = TelemetryRecord::new("esp32-a1b2c3", ts, EnergyReading::Estimated, switches);
        rec.classroom = Some("Lab1".to_string());
        rec.logical_name = Some("Lab1 switchboard".to_string());
        rec
    }

    #[test]
    fn observe_refreshes_registry_fields() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        let mut dev = Device::new("esp32-a1b2c3");
        dev.observe(&record(ts));

        assert_eq!(dev.classroom.as_deref(), Some("Lab1"));
        assert_eq!(dev.rated_power_w("1"), Some(75.0));
        assert_eq!(dev.last_seen, Some(ts));
        assert_eq!(dev.status, DeviceStatus::Online);
    }

    #[test]
    fn observe_keeps_newest_last_seen() {
        let newer = Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        let mut dev = Device::new("esp32-a1b2c3");
        dev.observe(&record(newer));
        dev.observe(&record(older));
        assert_eq!(dev.last_seen, Some(newer));
    }

    #[test]
    fn seconds_since_seen() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 9, 5, 0).unwrap();
        let mut dev = Device::new("esp32-a1b2c3");
        assert!(dev.seconds_since_seen(now).is_none());
        dev.observe(&record(ts));
        assert_eq!(dev.seconds_since_seen(now), Some(300));
    }

    #[test]
    fn status_roundtrip() {
        for s in &[DeviceStatus::Online, DeviceStatus::Offline, DeviceStatus::Unknown] {
            assert_eq!(DeviceStatus::from_str(s.as_str()), Some(*s));
        }
        assert!(DeviceStatus::from_str("bogus").is_none());
    }
}
