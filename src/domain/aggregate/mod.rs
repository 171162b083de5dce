//! Aggregate rollups
//!
//! Derived daily/monthly summaries. Fully recomputable from the ledger
//! plus the cost version table; never hand-edited.

pub mod model;
pub mod repository;

pub use model::{
    DailyAggregate, DailySummary, DailyTotal, DeviceDailyUsage, MonthlyAggregate, MonthlySummary,
    QualitySummary, TimelineBucket,
};
pub use repository::AggregateRepository;
