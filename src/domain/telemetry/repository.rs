//! Telemetry repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::TelemetryRecord;
use crate::domain::DomainResult;

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Persist a record verbatim. Records are immutable after this point.
    async fn save(&self, record: TelemetryRecord) -> DomainResult<()>;
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TelemetryRecord>>;
    /// Flip the `processed` flag; the only mutation a stored record sees.
    async fn mark_processed(&self, ids: &[Uuid]) -> DomainResult<()>;
    async fn list_unprocessed(&self, limit: u64) -> DomainResult<Vec<TelemetryRecord>>;
    async fn count_all(&self) -> DomainResult<i64>;
    async fn count_unprocessed(&self) -> DomainResult<i64>;
    async fn count_since(&self, since: DateTime<Utc>) -> DomainResult<i64>;
}
