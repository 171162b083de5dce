//! Create ledger_entries table
//!
//! The unique index over (device_id, switch_id, start_ts) backs the
//! idempotent-insert guarantee for replayed telemetry.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::DeviceId).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::SwitchId).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::SwitchName).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Classroom).string())
                    .col(
                        ColumnDef::new(LedgerEntries::StartTs)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::EndTs)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::DurationSeconds)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::DeltaWh).double().not_null())
                    .col(ColumnDef::new(LedgerEntries::PowerW).double().not_null())
                    .col(ColumnDef::new(LedgerEntries::SwitchState).boolean().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::Method)
                            .string()
                            .not_null()
                            .default("estimated"),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::Confidence)
                            .string()
                            .not_null()
                            .default("medium"),
                    )
                    .col(ColumnDef::new(LedgerEntries::QualityReason).string())
                    .col(ColumnDef::new(LedgerEntries::CostPerKwh).double().not_null())
                    .col(ColumnDef::new(LedgerEntries::CostInr).double().not_null())
                    .col(ColumnDef::new(LedgerEntries::CounterEndWh).double())
                    .col(ColumnDef::new(LedgerEntries::CalcRunId).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_device_switch_start")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::DeviceId)
                    .col(LedgerEntries::SwitchId)
                    .col(LedgerEntries::StartTs)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_classroom_window")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::Classroom)
                    .col(LedgerEntries::StartTs)
                    .col(LedgerEntries::EndTs)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum LedgerEntries {
    Table,
    Id,
    DeviceId,
    SwitchId,
    SwitchName,
    Classroom,
    StartTs,
    EndTs,
    DurationSeconds,
    DeltaWh,
    PowerW,
    SwitchState,
    Method,
    Confidence,
    QualityReason,
    CostPerKwh,
    CostInr,
    CounterEndWh,
    CalcRunId,
    CreatedAt,
}
