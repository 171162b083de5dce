//! Create monthly_aggregates table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonthlyAggregates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyAggregates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MonthlyAggregates::DeviceId).string().not_null())
                    .col(ColumnDef::new(MonthlyAggregates::Classroom).string())
                    .col(ColumnDef::new(MonthlyAggregates::Month).string().not_null())
                    .col(
                        ColumnDef::new(MonthlyAggregates::TotalWh)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(MonthlyAggregates::OnTimeSecs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyAggregates::CostInr)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(MonthlyAggregates::DailyTotals).json().not_null())
                    .col(
                        ColumnDef::new(MonthlyAggregates::MeasuredEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyAggregates::EstimatedEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyAggregates::GapFilledEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MonthlyAggregates::CalcRunId).string().not_null())
                    .col(
                        ColumnDef::new(MonthlyAggregates::CalculatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_device_month")
                    .table(MonthlyAggregates::Table)
                    .col(MonthlyAggregates::DeviceId)
                    .col(MonthlyAggregates::Month)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MonthlyAggregates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum MonthlyAggregates {
    Table,
    Id,
    DeviceId,
    Classroom,
    Month,
    TotalWh,
    OnTimeSecs,
    CostInr,
    DailyTotals,
    MeasuredEntries,
    EstimatedEntries,
    GapFilledEntries,
    CalcRunId,
    CalculatedAt,
}
