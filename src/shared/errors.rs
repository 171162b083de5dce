use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Cost version overlap for scope {scope}: conflicts with version effective from {conflict_from}")]
    Overlap {
        scope: String,
        conflict_from: DateTime<Utc>,
        conflict_until: Option<DateTime<Utc>>,
    },
}

impl DomainError {
    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            // DB errors mapped from repositories contain "Database error:" prefix
            DomainError::Validation(msg) => msg.starts_with("Database error:"),
            _ => false,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_covers_database_failures_only() {
        let db = DomainError::Validation("Database error: connection reset".to_string());
        assert!(db.is_transient());

        let validation = DomainError::Validation("bucket_minutes must be > 0".to_string());
        assert!(!validation.is_transient());
        assert!(!DomainError::Conflict("duplicate".to_string()).is_transient());
        assert!(!DomainError::NotFound {
            entity: "Device",
            field: "device_id",
            value: "esp32-a1b2c3".to_string(),
        }
        .is_transient());
    }
}
