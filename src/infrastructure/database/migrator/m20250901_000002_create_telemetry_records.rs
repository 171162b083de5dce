//! Create telemetry_records table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TelemetryRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TelemetryRecords::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TelemetryRecords::DeviceId).string().not_null())
                    .col(ColumnDef::new(TelemetryRecords::LogicalName).string())
                    .col(ColumnDef::new(TelemetryRecords::Classroom).string())
                    .col(
                        ColumnDef::new(TelemetryRecords::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TelemetryRecords::ReadingKind)
                            .string()
                            .not_null()
                            .default("estimated"),
                    )
                    .col(ColumnDef::new(TelemetryRecords::EnergyWh).double())
                    .col(ColumnDef::new(TelemetryRecords::PowerW).double())
                    .col(ColumnDef::new(TelemetryRecords::Switches).json().not_null())
                    .col(ColumnDef::new(TelemetryRecords::Status).string())
                    .col(ColumnDef::new(TelemetryRecords::RawPayload).json().not_null())
                    .col(
                        ColumnDef::new(TelemetryRecords::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_telemetry_device_ts")
                    .table(TelemetryRecords::Table)
                    .col(TelemetryRecords::DeviceId)
                    .col(TelemetryRecords::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_telemetry_processed")
                    .table(TelemetryRecords::Table)
                    .col(TelemetryRecords::Processed)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TelemetryRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TelemetryRecords {
    Table,
    Id,
    DeviceId,
    LogicalName,
    Classroom,
    Timestamp,
    ReadingKind,
    EnergyWh,
    PowerW,
    Switches,
    Status,
    RawPayload,
    Processed,
}
