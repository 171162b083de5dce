//! Create daily_aggregates table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyAggregates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyAggregates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyAggregates::DeviceId).string().not_null())
                    .col(ColumnDef::new(DailyAggregates::Classroom).string())
                    .col(ColumnDef::new(DailyAggregates::Date).string().not_null())
                    .col(
                        ColumnDef::new(DailyAggregates::TotalWh)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyAggregates::OnTimeSecs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyAggregates::CostInr)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyAggregates::MeasuredEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyAggregates::EstimatedEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyAggregates::GapFilledEntries)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DailyAggregates::CalcRunId).string().not_null())
                    .col(
                        ColumnDef::new(DailyAggregates::CalculatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_daily_device_date")
                    .table(DailyAggregates::Table)
                    .col(DailyAggregates::DeviceId)
                    .col(DailyAggregates::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_daily_classroom_date")
                    .table(DailyAggregates::Table)
                    .col(DailyAggregates::Classroom)
                    .col(DailyAggregates::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyAggregates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum DailyAggregates {
    Table,
    Id,
    DeviceId,
    Classroom,
    Date,
    TotalWh,
    OnTimeSecs,
    CostInr,
    MeasuredEntries,
    EstimatedEntries,
    GapFilledEntries,
    CalcRunId,
    CalculatedAt,
}
