//! Ledger repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::LedgerEntry;
use crate::domain::DomainResult;

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Append an entry under its uniqueness key (device, switch, start_ts).
    ///
    /// Returns `false` when an entry with the same key already exists —
    /// the idempotent no-op that protects against replayed telemetry.
    async fn insert(&self, entry: LedgerEntry) -> DomainResult<bool>;

    /// Most recent entry for one switch, by end_ts. Used to re-seed
    /// open-interval state after a restart.
    async fn last_entry_for_switch(
        &self,
        device_id: &str,
        switch_id: &str,
    ) -> DomainResult<Option<LedgerEntry>>;

    /// Distinct switch IDs a device has ledger history for.
    async fn switch_ids_for_device(&self, device_id: &str) -> DomainResult<Vec<String>>;

    /// Entries whose [start_ts, end_ts) intersects [from, until),
    /// optionally restricted to one classroom.
    async fn list_overlapping(
        &self,
        classroom: Option<&str>,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>>;

    /// Entries for one device intersecting [from, until).
    async fn list_for_device_overlapping(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>>;

    async fn count_all(&self) -> DomainResult<i64>;
}
