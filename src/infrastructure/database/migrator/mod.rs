//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_devices;
mod m20250901_000002_create_telemetry_records;
mod m20250901_000003_create_cost_versions;
mod m20250901_000004_create_ledger_entries;
mod m20250901_000005_create_daily_aggregates;
mod m20250901_000006_create_monthly_aggregates;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_devices::Migration),
            Box::new(m20250901_000002_create_telemetry_records::Migration),
            Box::new(m20250901_000003_create_cost_versions::Migration),
            Box::new(m20250901_000004_create_ledger_entries::Migration),
            Box::new(m20250901_000005_create_daily_aggregates::Migration),
            Box::new(m20250901_000006_create_monthly_aggregates::Migration),
        ]
    }
}
