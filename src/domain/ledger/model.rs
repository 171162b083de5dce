//! Ledger domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the interval's energy was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Delta of a hardware energy counter
    Measured,
    /// Rated power × switch-on duration
    Estimated,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measured => "measured",
            Self::Estimated => "estimated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "measured" => Some(Self::Measured),
            "estimated" => Some(Self::Estimated),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Confidence grade attached to every ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality tag: confidence plus an optional machine-readable reason
/// (e.g. "counter-reset", "exceeds-rated-power", "gap-fill").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    pub confidence: Confidence,
    pub reason: Option<String>,
}

impl Quality {
    pub fn high() -> Self {
        Self {
            confidence: Confidence::High,
            reason: None,
        }
    }

    pub fn medium(reason: impl Into<String>) -> Self {
        Self {
            confidence: Confidence::Medium,
            reason: Some(reason.into()),
        }
    }

    pub fn low(reason: impl Into<String>) -> Self {
        Self {
            confidence: Confidence::Low,
            reason: Some(reason.into()),
        }
    }
}

/// Price snapshot captured when the entry was created.
///
/// Kept for audit; aggregation re-resolves prices at compute time so
/// retroactive cost corrections flow into summaries without touching
/// the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCalculation {
    /// Price applied, INR per kWh
    pub cost_per_kwh: f64,
    /// delta_wh / 1000 × cost_per_kwh
    pub cost_inr: f64,
}

impl CostCalculation {
    pub fn price(delta_wh: f64, cost_per_kwh: f64) -> Self {
        Self {
            cost_per_kwh,
            cost_inr: delta_wh / 1000.0 * cost_per_kwh,
        }
    }
}

/// Uniqueness key guarding against duplicate processing of replayed
/// telemetry: at most one entry per (device, switch, interval start).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct LedgerKey {
    pub device_id: String,
    pub switch_id: String,
    pub start_ts: DateTime<Utc>,
}

/// One closed consumption interval for one switch.
///
/// Append-only and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub device_id: String,
    pub switch_id: String,
    pub switch_name: String,
    /// Classroom at entry creation time, denormalized for aggregation
    pub classroom: Option<String>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Energy consumed in the interval, Wh. Never negative.
    pub delta_wh: f64,
    /// Average (measured) or rated (estimated) power over the interval, W
    pub power_w: f64,
    /// Switch state held during the interval
    pub switch_state: bool,
    pub method: Method,
    pub quality: Quality,
    pub cost: CostCalculation,
    /// Meter counter at end_ts (measured intervals only); lets a
    /// restarted generator re-seed its open baseline from the ledger.
    pub counter_end_wh: Option<f64>,
    /// Which processing run produced this entry
    pub calc_run_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Pro-rata share of an entry falling inside a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portion {
    /// Fraction of the interval inside the window, 0.0..=1.0
    pub fraction: f64,
    pub overlap_seconds: i64,
    pub delta_wh: f64,
    /// Share of the at-creation cost snapshot
    pub cost_inr: f64,
    /// Seconds the switch was ON inside the window
    pub on_seconds: i64,
}

impl LedgerEntry {
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            device_id: self.device_id.clone(),
            switch_id: self.switch_id.clone(),
            start_ts: self.start_ts,
        }
    }

    /// Whether [start_ts, end_ts) intersects [from, until).
    pub fn overlaps(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.start_ts < until && self.end_ts > from
    }

    /// Pro-rata share of this entry inside [from, until).
    ///
    /// Intervals crossing a window boundary (e.g. local midnight) are
    /// split proportionally by elapsed time; delta and cost split with
    /// the same fraction so the two sides always sum to the original.
    pub fn portion_within(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Option<Portion> {
        // Zero-length entries carry no time to apportion; attribute
        // them wholly to the window containing their start.
        if self.duration_seconds == 0 {
            if self.start_ts >= from && self.start_ts < until {
                return Some(Portion {
                    fraction: 1.0,
                    overlap_seconds: 0,
                    delta_wh: self.delta_wh,
                    cost_inr: self.cost.cost_inr,
                    on_seconds: 0,
                });
            }
            return None;
        }

        if !self.overlaps(from, until) {
            return None;
        }

        let clipped_start = self.start_ts.max(from);
        let clipped_end = self.end_ts.min(until);
        let overlap_seconds = (clipped_end - clipped_start).num_seconds();
        if overlap_seconds <= 0 {
            return None;
        }

        let fraction = overlap_seconds as f64 / self.duration_seconds as f64;

        Some(Portion {
            fraction,
            overlap_seconds,
            delta_wh: self.delta_wh * fraction,
            cost_inr: self.cost.cost_inr * fraction,
            on_seconds: if self.switch_state { overlap_seconds } else { 0 },
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────
