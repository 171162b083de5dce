//! Create cost_versions table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CostVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CostVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CostVersions::Scope)
                            .string()
                            .not_null()
                            .default("global"),
                    )
                    .col(ColumnDef::new(CostVersions::Classroom).string())
                    .col(ColumnDef::new(CostVersions::CostPerKwh).double().not_null())
                    .col(
                        ColumnDef::new(CostVersions::EffectiveFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CostVersions::EffectiveUntil).timestamp_with_time_zone())
                    .col(ColumnDef::new(CostVersions::Notes).string())
                    .col(
                        ColumnDef::new(CostVersions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cost_versions_scope_from")
                    .table(CostVersions::Table)
                    .col(CostVersions::Scope)
                    .col(CostVersions::Classroom)
                    .col(CostVersions::EffectiveFrom)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CostVersions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CostVersions {
    Table,
    Id,
    Scope,
    Classroom,
    CostPerKwh,
    EffectiveFrom,
    EffectiveUntil,
    Notes,
    CreatedAt,
}
