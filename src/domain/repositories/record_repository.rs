// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::models::record::DomainRecord;
use crate::utils::errors::RepositoryError;

/// 父记录链接
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    pub parent_model: String,
    pub parent_id: i64,
    /// 集合名
    pub collection: String,
}

/// 待写入的记录
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub model: String,
    pub record_id: i64,
    pub parent: Option<ParentLink>,
    pub payload: Value,
    pub source_updated_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    /// 从领域记录构建
    ///
    /// 嵌入的子集合不写入父记录的 payload，由子记录单独保存
    ///
    /// # 返回值
    ///
    /// 记录没有 id 时返回 `None`
    pub fn from_record(
        record: &DomainRecord,
        parent: Option<ParentLink>,
        embedded: &[&str],
    ) -> Option<Self> {
        let record_id = record.id?;
        Some(Self {
            model: record.model.to_string(),
            record_id,
            parent,
            payload: record.to_json_without(embedded),
            source_updated_at: record.updated_at(),
        })
    }
}

/// 记录仓库特质
///
/// 每次写入独立提交，按 (model, record_id) 幂等
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// 插入或更新记录
    async fn upsert(&self, record: &StoredRecord) -> Result<(), RepositoryError>;

    /// 解除父记录下不在 `keep_ids` 中的子记录链接
    ///
    /// # 返回值
    ///
    /// 返回被解除链接的记录数
    async fn unlink_missing_children(
        &self,
        child_model: &str,
        parent: &ParentLink,
        keep_ids: &[i64],
    ) -> Result<u64, RepositoryError>;

    /// 模型的记录数
    async fn count(&self, model: &str) -> Result<u64, RepositoryError>;

    /// 某个父记录下的子记录数
    async fn count_children(
        &self,
        child_model: &str,
        parent_model: &str,
        parent_id: i64,
    ) -> Result<u64, RepositoryError>;

    /// 没有父记录链接的子记录数
    async fn count_unlinked(&self, child_model: &str) -> Result<u64, RepositoryError>;

    /// 最近更新的记录 id，按来源更新时间倒序
    async fn recent_ids(&self, model: &str, limit: u64) -> Result<Vec<i64>, RepositoryError>;

    /// 模型全部 id，升序
    async fn all_ids(&self, model: &str) -> Result<Vec<i64>, RepositoryError>;

    /// 给定 id 中本地已存在的部分
    async fn existing_ids(&self, model: &str, ids: &[i64]) -> Result<HashSet<i64>, RepositoryError>;

    /// 删除全部同步记录
    ///
    /// # 返回值
    ///
    /// 返回删除的行数
    async fn delete_all(&self) -> Result<u64, RepositoryError>;
}
