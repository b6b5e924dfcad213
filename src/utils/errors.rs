// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::sync_cycle::CycleStatus;
use crate::engines::traits::FetchError;

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("未找到数据")]
    NotFound,

    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// 同步周期错误类型
///
/// 周期内任何致命错误都会在进程退出前写入状态记录的 `last_error` 字段
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("parity violation: {0}")]
    ParityViolation(String),

    #[error("invalid cycle transition: {from} -> {to}")]
    InvalidTransition { from: CycleStatus, to: CycleStatus },

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// 看门狗错误类型
#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("进程错误: {0}")]
    Process(#[from] std::io::Error),

    #[error("状态查询错误: {0}")]
    Status(#[from] RepositoryError),

    #[error("status check timed out")]
    StatusTimeout,
}
