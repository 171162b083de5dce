//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod aggregate_repository;
pub mod cost_version_repository;
pub mod device_repository;
pub mod ledger_repository;
pub mod repository_provider;
pub mod telemetry_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use crate::domain::DomainError;

/// Map database failures into the domain error space. The prefix is
/// what `DomainError::is_transient` keys on.
pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Validation(format!("Database error: {}", e))
}
