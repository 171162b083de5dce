//! Aggregation scheduler
//!
//! Two cadences: a frequent pass keeping "today" current for every
//! classroom, and a full pass that recomputes from the cost-correction
//! watermark (or yesterday) through today and then clears the
//! watermark. No request path ever blocks on these; reads fall back to
//! on-demand computation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::application::services::aggregation::AggregationService;
use crate::application::tracker::ChangeTracker;
use crate::config::AggregationSection;
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub today_interval_secs: u64,
    pub full_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            today_interval_secs: 300,
            full_interval_secs: 86_400,
        }
    }
}

impl From<&AggregationSection> for SchedulerConfig {
    fn from(section: &AggregationSection) -> Self {
        Self {
            today_interval_secs: section.today_interval_secs,
            full_interval_secs: section.full_interval_secs,
        }
    }
}

pub struct AggregationScheduler {
    repos: Arc<dyn RepositoryProvider>,
    aggregation: Arc<AggregationService>,
    tracker: Arc<ChangeTracker>,
    config: SchedulerConfig,
}

impl AggregationScheduler {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        aggregation: Arc<AggregationService>,
        tracker: Arc<ChangeTracker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repos,
            aggregation,
            tracker,
            config,
        }
    }

    /// Start both cadences as one background task
    pub fn start(&self, shutdown: ShutdownSignal) {
        let repos = self.repos.clone();
        let aggregation = self.aggregation.clone();
        let tracker = self.tracker.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            info!(
                "📊 Aggregation scheduler started (today pass: {}s, full pass: {}s)",
                config.today_interval_secs, config.full_interval_secs
            );

            let mut today_tick = tokio::time::interval(Duration::from_secs(config.today_interval_secs));
            let mut full_tick = tokio::time::interval(Duration::from_secs(config.full_interval_secs));

            loop {
                tokio::select! {
                    _ = today_tick.tick() => {
                        if let Err(e) = run_today_pass(&repos, &aggregation).await {
                            warn!("Today aggregation pass error: {}", e);
                        }
                    }
                    _ = full_tick.tick() => {
                        if let Err(e) = run_full_pass(&repos, &aggregation, &tracker).await {
                            warn!("Full aggregation pass error: {}", e);
                        }
                    }
                    _ = shutdown.wait() => {
                        info!("📊 Aggregation scheduler shutting down");
                        break;
                    }
                }
            }

            info!("📊 Aggregation scheduler stopped");
        });
    }
}

/// Keep today's aggregates current for every classroom.
async fn run_today_pass(
    repos: &Arc<dyn RepositoryProvider>,
    aggregation: &Arc<AggregationService>,
) -> DomainResult<()> {
    let today = aggregation.today_local();
    for classroom in repos.devices().list_classrooms().await? {
        let batch = aggregation.aggregate_daily(&classroom, today).await?;
        if !batch.failed.is_empty() {
            warn!(
                classroom = classroom.as_str(),
                failed = batch.failed.len(),
                "Today pass had per-device failures"
            );
        }
    }
    Ok(())
}

/// Recompute from the cost-correction watermark (or yesterday) through
/// today, then clear the watermark.
async fn run_full_pass(
    repos: &Arc<dyn RepositoryProvider>,
    aggregation: &Arc<AggregationService>,
    tracker: &Arc<ChangeTracker>,
) -> DomainResult<()> {
    let today = aggregation.today_local();
    let yesterday = today - chrono::Duration::days(1);
    let start = tracker
        .stale_watermark()
        .and_then(|w| NaiveDate::parse_from_str(&w, "%Y-%m-%d").ok())
        .map(|w| w.min(yesterday))
        .unwrap_or(yesterday);

    for classroom in repos.devices().list_classrooms().await? {
        let outcome = aggregation.re_aggregate_classroom(&classroom, start, today).await?;
        info!(
            classroom = classroom.as_str(),
            start = %start,
            daily = outcome.daily_regenerated,
            monthly = outcome.monthly_regenerated,
            "Full aggregation pass completed for classroom"
        );
    }

    tracker.reset_stale();
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────
