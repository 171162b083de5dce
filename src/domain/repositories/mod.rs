//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider` — unified access to all per-aggregate repositories
//! - `DomainResult` — standard result type for domain operations

use super::aggregate::AggregateRepository;
use super::costing::CostVersionRepository;
use super::device::DeviceRepository;
use super::ledger::LedgerRepository;
use super::telemetry::TelemetryRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

// ── RepositoryProvider ──────────────────────────────────────────

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let dev = repos.devices().find_by_id("esp32-a1b2c3").await?;
///     let last = repos.ledger().last_entry_for_switch("esp32-a1b2c3", "1").await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn devices(&self) -> &dyn DeviceRepository;
    fn telemetry(&self) -> &dyn TelemetryRepository;
    fn ledger(&self) -> &dyn LedgerRepository;
    fn cost_versions(&self) -> &dyn CostVersionRepository;
    fn aggregates(&self) -> &dyn AggregateRepository;
}
