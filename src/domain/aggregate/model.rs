//! Aggregate domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ledger::{Confidence, LedgerEntry, Method};

/// Entry counts by provenance, carried on every aggregate so dashboards
/// can show how much of a total is metered vs. guessed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub measured_entries: i64,
    pub estimated_entries: i64,
    pub gap_filled_entries: i64,
}

impl QualitySummary {
    pub fn record(&mut self, entry: &LedgerEntry) {
        if entry.quality.confidence == Confidence::Low {
            self.gap_filled_entries += 1;
        } else {
            match entry.method {
                Method::Measured => self.measured_entries += 1,
                Method::Estimated => self.estimated_entries += 1,
            }
        }
    }

    pub fn total(&self) -> i64 {
        self.measured_entries + self.estimated_entries + self.gap_filled_entries
    }
}

/// One device's rollup for one local day.
///
/// Keyed by (device_id, date); upserted, never appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub device_id: String,
    pub classroom: Option<String>,
    /// Local date, "YYYY-MM-DD" in the facility timezone
    pub date: String,
    pub total_wh: f64,
    /// Seconds any switch was ON inside the day
    pub on_time_secs: i64,
    /// Cost at calculation time (re-priced on every recomputation)
    pub cost_inr: f64,
    pub quality: QualitySummary,
    pub calc_run_id: Uuid,
    pub calculated_at: DateTime<Utc>,
}

impl DailyAggregate {
    pub fn total_kwh(&self) -> f64 {
        self.total_wh / 1000.0
    }

    pub fn on_time_hours(&self) -> f64 {
        self.on_time_secs as f64 / 3600.0
    }
}

/// Per-day line inside a monthly aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: String,
    pub total_wh: f64,
    pub cost_inr: f64,
}

/// One device's rollup for one month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub device_id: String,
    pub classroom: Option<String>,
    /// "YYYY-MM"
    pub month: String,
    pub total_wh: f64,
    pub on_time_secs: i64,
    pub cost_inr: f64,
    /// One line per day with ledger data; Σ total_wh equals the month
    /// total within floating-point epsilon.
    pub daily_totals: Vec<DailyTotal>,
    pub quality: QualitySummary,
    pub calc_run_id: Uuid,
    pub calculated_at: DateTime<Utc>,
}

impl MonthlyAggregate {
    pub fn total_kwh(&self) -> f64 {
        self.total_wh / 1000.0
    }
}

/// Per-device line in a classroom summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDailyUsage {
    pub device_id: String,
    pub total_kwh: f64,
    pub cost_inr: f64,
    pub on_time_hours: f64,
}

/// Classroom-level answer for `GetDailySummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub classroom: String,
    pub date: String,
    pub total_kwh: f64,
    pub total_cost_inr: f64,
    pub on_time_hours: f64,
    pub devices: Vec<DeviceDailyUsage>,
}

/// Classroom-level answer for `GetMonthlySummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub classroom: String,
    pub month: String,
    pub total_kwh: f64,
    pub total_cost_inr: f64,
    pub daily_totals: Vec<DailyTotal>,
}

/// One slot of the `GetTimeline` series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub bucket_start: DateTime<Utc>,
    pub total_wh: f64,
    pub cost_inr: f64,
}

// ── Tests ──────────────────────────────────────────────────────
