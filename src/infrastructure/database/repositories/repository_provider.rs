//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::aggregate::AggregateRepository;
use crate::domain::costing::CostVersionRepository;
use crate::domain::device::DeviceRepository;
use crate::domain::ledger::LedgerRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::telemetry::TelemetryRepository;

use super::aggregate_repository::SeaOrmAggregateRepository;
use super::cost_version_repository::SeaOrmCostVersionRepository;
use super::device_repository::SeaOrmDeviceRepository;
use super::ledger_repository::SeaOrmLedgerRepository;
use super::telemetry_repository::SeaOrmTelemetryRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let dev = repos.devices().find_by_id("esp32-a1b2c3").await?;
/// let last = repos.ledger().last_entry_for_switch("esp32-a1b2c3", "1").await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    devices: SeaOrmDeviceRepository,
    telemetry: SeaOrmTelemetryRepository,
    ledger: SeaOrmLedgerRepository,
    cost_versions: SeaOrmCostVersionRepository,
    aggregates: SeaOrmAggregateRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            devices: SeaOrmDeviceRepository::new(db.clone()),
            telemetry: SeaOrmTelemetryRepository::new(db.clone()),
            ledger: SeaOrmLedgerRepository::new(db.clone()),
            cost_versions: SeaOrmCostVersionRepository::new(db.clone()),
            aggregates: SeaOrmAggregateRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn devices(&self) -> &dyn DeviceRepository {
        &self.devices
    }

    fn telemetry(&self) -> &dyn TelemetryRepository {
        &self.telemetry
    }

    fn ledger(&self) -> &dyn LedgerRepository {
        &self.ledger
    }

    fn cost_versions(&self) -> &dyn CostVersionRepository {
        &self.cost_versions
    }

    fn aggregates(&self) -> &dyn AggregateRepository {
        &self.aggregates
    }
}
