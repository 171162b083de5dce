//! Device registry repository interface

use async_trait::async_trait;

use super::model::{Device, DeviceStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert or replace the registry row for a device.
    async fn upsert(&self, device: Device) -> DomainResult<()>;
    async fn find_by_id(&self, device_id: &str) -> DomainResult<Option<Device>>;
    async fn list_all(&self) -> DomainResult<Vec<Device>>;
    async fn list_for_classroom(&self, classroom: &str) -> DomainResult<Vec<Device>>;
    async fn update_status(&self, device_id: &str, status: DeviceStatus) -> DomainResult<()>;
    async fn count_online(&self) -> DomainResult<i64>;
    /// Distinct classrooms with at least one registered device.
    async fn list_classrooms(&self) -> DomainResult<Vec<String>>;
}
