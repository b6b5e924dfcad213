// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::checkpoint_repository::CheckpointRepository;
use crate::infrastructure::database::entities::sync_checkpoint;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

/// 水位线仓库实现
#[derive(Clone)]
pub struct CheckpointRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl CheckpointRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointRepository for CheckpointRepositoryImpl {
    async fn last_updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let model = sync_checkpoint::Entity::find_by_id(name.to_string())
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(|m| m.last_updated_at.with_timezone(&Utc)))
    }

    async fn commit(
        &self,
        name: &str,
        updated_at: DateTime<Utc>,
        cycle_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let model = sync_checkpoint::ActiveModel {
            name: Set(name.to_string()),
            last_updated_at: Set(updated_at.into()),
            cycle_id: Set(cycle_id.map(str::to_string)),
            committed_at: Set(Utc::now().into()),
        };
        sync_checkpoint::Entity::insert(model)
            .on_conflict(
                OnConflict::column(sync_checkpoint::Column::Name)
                    .update_columns([
                        sync_checkpoint::Column::LastUpdatedAt,
                        sync_checkpoint::Column::CycleId,
                        sync_checkpoint::Column::CommittedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool, RepositoryError> {
        let result = sync_checkpoint::Entity::delete_by_id(name.to_string())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
