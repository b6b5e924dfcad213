// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::sync_cycle::SyncCycle;
use crate::domain::repositories::sync_status_repository::SyncStatusRepository;
use crate::infrastructure::database::entities::sync_status::{self, STATUS_ROW_ID};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

/// 同步状态仓库实现
#[derive(Clone)]
pub struct SyncStatusRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SyncStatusRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<sync_status::Model> for SyncCycle {
    fn from(model: sync_status::Model) -> Self {
        Self {
            cycle_id: model.cycle_id,
            mode: model.mode.and_then(|m| m.parse().ok()),
            status: model.status.parse().unwrap_or_default(),
            current_model: model.current_model,
            current_page: model.current_page.and_then(|p| u32::try_from(p).ok()),
            records_processed: u64::try_from(model.records_processed).unwrap_or_default(),
            started_at: model.cycle_started_at.map(|dt| dt.with_timezone(&Utc)),
            finished_at: model.cycle_finished_at.map(|dt| dt.with_timezone(&Utc)),
            last_heartbeat: model.last_heartbeat.map(|dt| dt.with_timezone(&Utc)),
            last_error: model.last_error,
            updated_at: model.updated_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl From<&SyncCycle> for sync_status::ActiveModel {
    fn from(cycle: &SyncCycle) -> Self {
        Self {
            id: Set(STATUS_ROW_ID),
            cycle_id: Set(cycle.cycle_id.clone()),
            status: Set(cycle.status.to_string()),
            mode: Set(cycle.mode.map(|m| m.to_string())),
            current_model: Set(cycle.current_model.clone()),
            current_page: Set(cycle.current_page.and_then(|p| i32::try_from(p).ok())),
            records_processed: Set(i64::try_from(cycle.records_processed).unwrap_or(i64::MAX)),
            cycle_started_at: Set(cycle.started_at.map(Into::into)),
            cycle_finished_at: Set(cycle.finished_at.map(Into::into)),
            last_heartbeat: Set(cycle.last_heartbeat.map(Into::into)),
            last_error: Set(cycle.last_error.clone()),
            updated_at: Set(Some(cycle.updated_at.unwrap_or_else(Utc::now).into())),
        }
    }
}

#[async_trait]
impl SyncStatusRepository for SyncStatusRepositoryImpl {
    async fn load(&self) -> Result<Option<SyncCycle>, RepositoryError> {
        let model = sync_status::Entity::find_by_id(STATUS_ROW_ID)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn save(&self, cycle: &SyncCycle) -> Result<(), RepositoryError> {
        let model: sync_status::ActiveModel = cycle.into();
        sync_status::Entity::insert(model)
            .on_conflict(
                OnConflict::column(sync_status::Column::Id)
                    .update_columns([
                        sync_status::Column::CycleId,
                        sync_status::Column::Status,
                        sync_status::Column::Mode,
                        sync_status::Column::CurrentModel,
                        sync_status::Column::CurrentPage,
                        sync_status::Column::RecordsProcessed,
                        sync_status::Column::CycleStartedAt,
                        sync_status::Column::CycleFinishedAt,
                        sync_status::Column::LastHeartbeat,
                        sync_status::Column::LastError,
                        sync_status::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }
}
