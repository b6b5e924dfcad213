// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::repositories::record_repository::{ParentLink, RecordRepository, StoredRecord};
use crate::infrastructure::database::entities::synced_record;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::HashSet;
use std::sync::Arc;

/// SQLite 单条语句的参数上限较低，`IN` 查询分批执行
const ID_CHUNK: usize = 500;

/// 记录仓库实现
///
/// 基于SeaORM实现，每条记录按 (model, record_id) 覆盖写入
#[derive(Clone)]
pub struct RecordRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl RecordRepositoryImpl {
    /// 创建新的记录仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<&StoredRecord> for synced_record::ActiveModel {
    fn from(record: &StoredRecord) -> Self {
        Self {
            model: Set(record.model.clone()),
            record_id: Set(record.record_id),
            parent_model: Set(record.parent.as_ref().map(|p| p.parent_model.clone())),
            parent_id: Set(record.parent.as_ref().map(|p| p.parent_id)),
            collection: Set(record.parent.as_ref().map(|p| p.collection.clone())),
            payload: Set(record.payload.clone()),
            source_updated_at: Set(record.source_updated_at.map(Into::into)),
            synced_at: Set(Utc::now().into()),
        }
    }
}

#[async_trait]
impl RecordRepository for RecordRepositoryImpl {
    async fn upsert(&self, record: &StoredRecord) -> Result<(), RepositoryError> {
        let mut update_columns = vec![
            synced_record::Column::Payload,
            synced_record::Column::SourceUpdatedAt,
            synced_record::Column::SyncedAt,
        ];
        // Top-level writes keep any existing parent link.
        if record.parent.is_some() {
            update_columns.extend([
                synced_record::Column::ParentModel,
                synced_record::Column::ParentId,
                synced_record::Column::Collection,
            ]);
        }

        let model: synced_record::ActiveModel = record.into();
        synced_record::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([synced_record::Column::Model, synced_record::Column::RecordId])
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn unlink_missing_children(
        &self,
        child_model: &str,
        parent: &ParentLink,
        keep_ids: &[i64],
    ) -> Result<u64, RepositoryError> {
        let mut query = synced_record::Entity::update_many()
            .col_expr(synced_record::Column::ParentModel, Expr::value(Option::<String>::None))
            .col_expr(synced_record::Column::ParentId, Expr::value(Option::<i64>::None))
            .col_expr(synced_record::Column::Collection, Expr::value(Option::<String>::None))
            .filter(synced_record::Column::Model.eq(child_model))
            .filter(synced_record::Column::ParentModel.eq(parent.parent_model.as_str()))
            .filter(synced_record::Column::ParentId.eq(parent.parent_id))
            .filter(synced_record::Column::Collection.eq(parent.collection.as_str()));

        if !keep_ids.is_empty() {
            query = query.filter(synced_record::Column::RecordId.is_not_in(keep_ids.to_vec()));
        }

        let result = query.exec(self.db.as_ref()).await?;
        Ok(result.rows_affected)
    }

    async fn count(&self, model: &str) -> Result<u64, RepositoryError> {
        let count = synced_record::Entity::find()
            .filter(synced_record::Column::Model.eq(model))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn count_children(
        &self,
        child_model: &str,
        parent_model: &str,
        parent_id: i64,
    ) -> Result<u64, RepositoryError> {
        let count = synced_record::Entity::find()
            .filter(synced_record::Column::Model.eq(child_model))
            .filter(synced_record::Column::ParentModel.eq(parent_model))
            .filter(synced_record::Column::ParentId.eq(parent_id))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn count_unlinked(&self, child_model: &str) -> Result<u64, RepositoryError> {
        let count = synced_record::Entity::find()
            .filter(synced_record::Column::Model.eq(child_model))
            .filter(synced_record::Column::ParentId.is_null())
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn recent_ids(&self, model: &str, limit: u64) -> Result<Vec<i64>, RepositoryError> {
        let ids = synced_record::Entity::find()
            .select_only()
            .column(synced_record::Column::RecordId)
            .filter(synced_record::Column::Model.eq(model))
            .filter(synced_record::Column::SourceUpdatedAt.is_not_null())
            .order_by_desc(synced_record::Column::SourceUpdatedAt)
            .order_by_desc(synced_record::Column::RecordId)
            .limit(limit)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await?;
        Ok(ids)
    }

    async fn all_ids(&self, model: &str) -> Result<Vec<i64>, RepositoryError> {
        let ids = synced_record::Entity::find()
            .select_only()
            .column(synced_record::Column::RecordId)
            .filter(synced_record::Column::Model.eq(model))
            .order_by_asc(synced_record::Column::RecordId)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await?;
        Ok(ids)
    }

    async fn existing_ids(&self, model: &str, ids: &[i64]) -> Result<HashSet<i64>, RepositoryError> {
        let mut existing = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let found = synced_record::Entity::find()
                .select_only()
                .column(synced_record::Column::RecordId)
                .filter(synced_record::Column::Model.eq(model))
                .filter(synced_record::Column::RecordId.is_in(chunk.to_vec()))
                .into_tuple::<i64>()
                .all(self.db.as_ref())
                .await?;
            existing.extend(found);
        }
        Ok(existing)
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = synced_record::Entity::delete_many()
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
