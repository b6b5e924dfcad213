// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::repositories::checkpoint_repository::{CheckpointRepository, SYNC_CHECKPOINT};
use crate::domain::repositories::record_repository::RecordRepository;
use crate::utils::errors::SyncError;

/// 清空结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub records_deleted: u64,
    pub checkpoint_cleared: bool,
}

/// 清空同步数据
///
/// 删除全部同步记录并移除水位线，下一个周期从头全量同步
pub struct FlushUseCase {
    records: Arc<dyn RecordRepository>,
    checkpoints: Arc<dyn CheckpointRepository>,
}

impl FlushUseCase {
    pub fn new(records: Arc<dyn RecordRepository>, checkpoints: Arc<dyn CheckpointRepository>) -> Self {
        Self {
            records,
            checkpoints,
        }
    }

    pub async fn run(&self) -> Result<FlushSummary, SyncError> {
        warn!("Flushing all synced records");
        let records_deleted = self.records.delete_all().await?;
        let checkpoint_cleared = self.checkpoints.clear(SYNC_CHECKPOINT).await?;
        info!(
            "Flush done records_deleted={} checkpoint_cleared={}",
            records_deleted, checkpoint_cleared
        );
        Ok(FlushSummary {
            records_deleted,
            checkpoint_cleared,
        })
    }
}
