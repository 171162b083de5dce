//! Cost version repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{CostScope, CostVersion, NewCostVersion};
use crate::domain::DomainResult;

#[async_trait]
pub trait CostVersionRepository: Send + Sync {
    /// Create a version, atomically closing the currently-open version of
    /// the same scope (`effective_until = new effective_from`).
    ///
    /// Fails with `DomainError::Overlap` when the new range would
    /// intersect an existing one; check, close and insert happen in a
    /// single transaction so two concurrent creations can never leave
    /// two open versions for one scope.
    async fn create_version(&self, new: NewCostVersion) -> DomainResult<CostVersion>;

    /// Version of the given scope whose range contains `at`.
    async fn find_effective(
        &self,
        scope: CostScope,
        classroom: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<CostVersion>>;

    async fn list_all(&self) -> DomainResult<Vec<CostVersion>>;
}
