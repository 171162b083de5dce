//! Cost version domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope a price applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostScope {
    /// Facility-wide default
    Global,
    /// One classroom; wins over Global where both apply
    Classroom,
}

impl CostScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Classroom => "classroom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "classroom" => Some(Self::Classroom),
            _ => None,
        }
    }
}

impl std::fmt::Display for CostScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the versioned price table.
///
/// Validity is the half-open range [effective_from, effective_until);
/// `effective_until = None` means open-ended. Within one scope, ranges
/// never overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostVersion {
    pub id: i32,
    pub scope: CostScope,
    /// Set iff scope == Classroom
    pub classroom: Option<String>,
    /// INR per kWh
    pub cost_per_kwh: f64,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CostVersion {
    /// Whether `at` falls inside [effective_from, effective_until).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if at < self.effective_from {
            return false;
        }
        match self.effective_until {
            Some(until) => at < until,
            None => true,
        }
    }

    /// Whether this version's range intersects [from, until).
    /// `until = None` means the candidate range is open-ended.
    pub fn overlaps(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> bool {
        let starts_before_candidate_ends = match until {
            Some(u) => self.effective_from < u,
            None => true,
        };
        let ends_after_candidate_starts = match self.effective_until {
            Some(u) => u > from,
            None => true,
        };
        starts_before_candidate_ends && ends_after_candidate_starts
    }

    /// Whether this version prices the same scope as (scope, classroom).
    pub fn same_scope(&self, scope: CostScope, classroom: Option<&str>) -> bool {
        self.scope == scope && self.classroom.as_deref() == classroom
    }

    pub fn is_open(&self) -> bool {
        self.effective_until.is_none()
    }
}

/// Administrative command creating a new price version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCostVersion {
    pub scope: CostScope,
    pub classroom: Option<String>,
    pub cost_per_kwh: f64,
    pub effective_from: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Resolved price for one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub cost_per_kwh: f64,
    /// None when the configured default price was used
    pub version_id: Option<i32>,
}

// ── Tests ──────────────────────────────────────────────────────
