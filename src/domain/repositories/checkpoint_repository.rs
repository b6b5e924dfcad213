// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::utils::errors::RepositoryError;

/// 默认水位线名称
pub const SYNC_CHECKPOINT: &str = "repairshopr";

/// 水位线仓库特质
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// 最近一次提交的水位线
    async fn last_updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    /// 提交新的水位线
    ///
    /// # 参数
    ///
    /// * `name` - 水位线名称
    /// * `updated_at` - 新的水位线，通常是周期开始时间
    /// * `cycle_id` - 提交该水位线的周期
    async fn commit(
        &self,
        name: &str,
        updated_at: DateTime<Utc>,
        cycle_id: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// 删除水位线，下一个周期将执行全量同步
    ///
    /// # 返回值
    ///
    /// 水位线存在并被删除时返回 `true`
    async fn clear(&self, name: &str) -> Result<bool, RepositoryError>;
}
