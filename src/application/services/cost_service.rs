//! Cost version service
//!
//! Price lookups and administrative price changes. Reads are lock-free;
//! creation is a compare-and-close handled transactionally by the
//! repository. A new version invalidates cached aggregates from its
//! effective date onward.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::application::tracker::ChangeTracker;
use crate::domain::{
    CostScope, CostVersion, DomainError, DomainResult, NewCostVersion, PriceQuote,
    RepositoryProvider,
};

pub struct CostService {
    repos: Arc<dyn RepositoryProvider>,
    tracker: Arc<ChangeTracker>,
    tz: Tz,
    /// Applied when no version covers a timestamp
    default_cost_per_kwh: f64,
}

impl CostService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        tracker: Arc<ChangeTracker>,
        tz: Tz,
        default_cost_per_kwh: f64,
    ) -> Self {
        Self {
            repos,
            tracker,
            tz,
            default_cost_per_kwh,
        }
    }

    /// Price effective at `at` for a device in `classroom`.
    ///
    /// A classroom-scoped version takes precedence over a global one;
    /// with neither, the configured default applies.
    pub async fn resolve(&self, classroom: Option<&str>, at: DateTime<Utc>) -> DomainResult<PriceQuote> {
        if let Some(classroom) = classroom {
            if let Some(version) = self
                .repos
                .cost_versions()
                .find_effective(CostScope::Classroom, Some(classroom), at)
                .await?
            {
                return Ok(PriceQuote {
                    cost_per_kwh: version.cost_per_kwh,
                    version_id: Some(version.id),
                });
            }
        }

        if let Some(version) = self
            .repos
            .cost_versions()
            .find_effective(CostScope::Global, None, at)
            .await?
        {
            return Ok(PriceQuote {
                cost_per_kwh: version.cost_per_kwh,
                version_id: Some(version.id),
            });
        }

        Ok(PriceQuote {
            cost_per_kwh: self.default_cost_per_kwh,
            version_id: None,
        })
    }

    /// Create a price version, closing the scope's open version.
    pub async fn create_version(&self, new: NewCostVersion) -> DomainResult<CostVersion> {
        if new.cost_per_kwh <= 0.0 || !new.cost_per_kwh.is_finite() {
            return Err(DomainError::Validation(format!(
                "cost_per_kwh must be positive, got {}",
                new.cost_per_kwh
            )));
        }
        match (new.scope, new.classroom.as_deref()) {
            (CostScope::Classroom, None) => {
                return Err(DomainError::Validation(
                    "classroom-scoped version needs a classroom".to_string(),
                ));
            }
            (CostScope::Global, Some(_)) => {
                return Err(DomainError::Validation(
                    "global version must not name a classroom".to_string(),
                ));
            }
            _ => {}
        }

        let version = self.repos.cost_versions().create_version(new).await?;

        // Aggregates priced before this version are stale from its
        // effective date onward.
        let stale_from = version
            .effective_from
            .with_timezone(&self.tz)
            .date_naive()
            .to_string();
        self.tracker.mark_stale_from(&stale_from);

        info!(
            version_id = version.id,
            scope = %version.scope,
            classroom = version.classroom.as_deref().unwrap_or("-"),
            cost_per_kwh = version.cost_per_kwh,
            effective_from = %version.effective_from,
            "Cost version created"
        );
        Ok(version)
    }

    pub async fn list_versions(&self) -> DomainResult<Vec<CostVersion>> {
        self.repos.cost_versions().list_all().await
    }
}

// ── Tests ──────────────────────────────────────────────────────
