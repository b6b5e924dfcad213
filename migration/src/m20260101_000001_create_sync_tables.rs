// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Normalized vendor records, one row per (model, record_id)
        manager
            .create_table(
                Table::create()
                    .table(SyncRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncRecords::Model).string().not_null())
                    .col(ColumnDef::new(SyncRecords::RecordId).big_integer().not_null())
                    .col(ColumnDef::new(SyncRecords::ParentModel).string())
                    .col(ColumnDef::new(SyncRecords::ParentId).big_integer())
                    .col(ColumnDef::new(SyncRecords::Collection).string())
                    .col(ColumnDef::new(SyncRecords::Payload).json().not_null())
                    .col(ColumnDef::new(SyncRecords::SourceUpdatedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SyncRecords::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(SyncRecords::Model)
                            .col(SyncRecords::RecordId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_records_parent")
                    .table(SyncRecords::Table)
                    .col(SyncRecords::Model)
                    .col(SyncRecords::ParentModel)
                    .col(SyncRecords::ParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_records_updated")
                    .table(SyncRecords::Table)
                    .col(SyncRecords::Model)
                    .col(SyncRecords::SourceUpdatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Single-row cycle status
        manager
            .create_table(
                Table::create()
                    .table(SyncStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncStatus::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncStatus::CycleId).string())
                    .col(
                        ColumnDef::new(SyncStatus::Status)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(ColumnDef::new(SyncStatus::Mode).string())
                    .col(ColumnDef::new(SyncStatus::CurrentModel).string())
                    .col(ColumnDef::new(SyncStatus::CurrentPage).integer())
                    .col(
                        ColumnDef::new(SyncStatus::RecordsProcessed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncStatus::CycleStartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncStatus::CycleFinishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncStatus::LastHeartbeat).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncStatus::LastError).text())
                    .col(ColumnDef::new(SyncStatus::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Committed high-water marks
        manager
            .create_table(
                Table::create()
                    .table(SyncCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncCheckpoints::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncCheckpoints::LastUpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncCheckpoints::CycleId).string())
                    .col(
                        ColumnDef::new(SyncCheckpoints::CommittedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncCheckpoints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncRecords {
    Table,
    Model,
    RecordId,
    ParentModel,
    ParentId,
    Collection,
    Payload,
    SourceUpdatedAt,
    SyncedAt,
}

#[derive(DeriveIden)]
enum SyncStatus {
    Table,
    Id,
    CycleId,
    Status,
    Mode,
    CurrentModel,
    CurrentPage,
    RecordsProcessed,
    CycleStartedAt,
    CycleFinishedAt,
    LastHeartbeat,
    LastError,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SyncCheckpoints {
    Table,
    Name,
    LastUpdatedAt,
    CycleId,
    CommittedAt,
}
