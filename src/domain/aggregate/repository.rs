//! Aggregate repository interface

use async_trait::async_trait;

use super::model::{DailyAggregate, MonthlyAggregate};
use crate::domain::DomainResult;

#[async_trait]
pub trait AggregateRepository: Send + Sync {
    /// Replace-or-insert keyed by (device_id, date).
    async fn upsert_daily(&self, aggregate: DailyAggregate) -> DomainResult<()>;
    async fn get_daily(&self, device_id: &str, date: &str) -> DomainResult<Option<DailyAggregate>>;
    async fn list_daily_for_classroom(
        &self,
        classroom: &str,
        date: &str,
    ) -> DomainResult<Vec<DailyAggregate>>;
    /// Daily rows for one device with date in [from, until] (inclusive,
    /// lexicographic on "YYYY-MM-DD").
    async fn list_daily_for_device_range(
        &self,
        device_id: &str,
        from: &str,
        until: &str,
    ) -> DomainResult<Vec<DailyAggregate>>;

    /// Replace-or-insert keyed by (device_id, month).
    async fn upsert_monthly(&self, aggregate: MonthlyAggregate) -> DomainResult<()>;
    async fn get_monthly(
        &self,
        device_id: &str,
        month: &str,
    ) -> DomainResult<Option<MonthlyAggregate>>;
    async fn list_monthly_for_classroom(
        &self,
        classroom: &str,
        month: &str,
    ) -> DomainResult<Vec<MonthlyAggregate>>;
}
