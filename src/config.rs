//! Configuration module
//!
//! Reads TOML configuration (~/.config/autovolt-energy/config.toml by
//! default, overridable with the AUTOVOLT_CONFIG environment variable).
//! Every section falls back to sensible defaults so the service starts
//! on a fresh machine without a config file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::shared::errors::DomainError;

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autovolt-energy")
        .join("config.toml")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite path; "sqlite://{path}?mode=rwc" is derived from it
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "./autovolt-energy.db".to_string(),
        }
    }
}

impl DatabaseSection {
    pub fn connection_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Force-close an unchanged open interval after this many seconds
    pub flush_interval_secs: i64,
    /// Lower clamp for duration-based estimates (division noise guard)
    pub min_interval_secs: i64,
    /// Upper clamp for duration-based estimates (runaway offline gaps)
    pub max_interval_secs: i64,
    /// Measured deltas above rated power × duration × this factor are
    /// tagged medium confidence
    pub plausibility_factor: f64,
    /// Only aggregate entries whose end_ts is at least this old
    pub aggregation_grace_secs: i64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            flush_interval_secs: 3600,
            min_interval_secs: 10,
            max_interval_secs: 86_400,
            plausibility_factor: 1.5,
            aggregation_grace_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    /// Applied when no cost version covers a timestamp, INR per kWh
    pub default_cost_per_kwh: f64,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            default_cost_per_kwh: 7.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconciliationSection {
    /// How often the sweep runs
    pub check_interval_secs: u64,
    /// Stock boards heartbeat every ~60 s; three misses = offline
    pub offline_after_secs: i64,
    /// Emit low-confidence estimates for switches left ON across gaps
    pub gap_fill: bool,
}

impl Default for ReconciliationSection {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            offline_after_secs: 180,
            gap_fill: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationSection {
    /// Cadence of the rolling "today" pass
    pub today_interval_secs: u64,
    /// Cadence of the full pass over yesterday (nightly by default)
    pub full_interval_secs: u64,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            today_interval_secs: 300,
            full_interval_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacilitySection {
    /// IANA timezone used for local-day bucketing
    pub timezone: String,
}

impl Default for FacilitySection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

impl FacilitySection {
    pub fn tz(&self) -> Result<Tz, DomainError> {
        Tz::from_str(&self.timezone)
            .map_err(|_| DomainError::Validation(format!("Unknown timezone: {}", self.timezone)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Grace period for background jobs on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            shutdown_timeout: 30,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub pipeline: PipelineSection,
    pub pricing: PricingSection,
    pub reconciliation: ReconciliationSection,
    pub aggregation: AggregationSection,
    pub facility: FacilitySection,
    pub logging: LoggingSection,
    pub server: ServerSection,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Validation(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| DomainError::Validation(format!("Invalid config {}: {}", path.display(), e)))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pipeline.flush_interval_secs, 3600);
        assert_eq!(cfg.pipeline.min_interval_secs, 10);
        assert_eq!(cfg.pipeline.max_interval_secs, 86_400);
        assert_eq!(cfg.pricing.default_cost_per_kwh, 7.5);
        assert_eq!(cfg.reconciliation.offline_after_secs, 180);
        assert!(cfg.facility.tz().is_ok());
    }

    #[test]
    fn connection_url_is_sqlite_rwc() {
        let db = DatabaseSection {
            path: "/tmp/energy.db".to_string(),
        };
        assert_eq!(db.connection_url(), "sqlite:///tmp/energy.db?mode=rwc");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [pricing]
            default_cost_per_kwh = 8.25

            [facility]
            timezone = "Europe/Prague"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pricing.default_cost_per_kwh, 8.25);
        assert_eq!(cfg.facility.timezone, "Europe/Prague");
        assert!(cfg.facility.tz().is_ok());
        // untouched sections keep defaults
        assert_eq!(cfg.pipeline.flush_interval_secs, 3600);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let facility = FacilitySection {
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(facility.tz().is_err());
    }
}
