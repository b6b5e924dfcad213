// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;

use crate::domain::models::sync_cycle::SyncCycle;
use crate::utils::errors::RepositoryError;

/// 同步状态仓库特质
///
/// 状态记录只有一行，整行读写
#[async_trait]
pub trait SyncStatusRepository: Send + Sync {
    /// 读取状态记录
    async fn load(&self) -> Result<Option<SyncCycle>, RepositoryError>;
    /// 整行覆盖写入状态记录
    async fn save(&self, cycle: &SyncCycle) -> Result<(), RepositoryError>;
}
