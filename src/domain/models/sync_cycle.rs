// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::errors::SyncError;

/// 同步周期状态
///
/// 状态转换遵循以下流程：
/// Idle → Running → Success/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CycleStatus::Idle => write!(f, "idle"),
            CycleStatus::Running => write!(f, "running"),
            CycleStatus::Success => write!(f, "success"),
            CycleStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for CycleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(CycleStatus::Idle),
            "running" => Ok(CycleStatus::Running),
            "success" => Ok(CycleStatus::Success),
            "failed" => Ok(CycleStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 同步模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// 全量扫描
    Full,
    /// 增量同步，允许尾页窗口优化
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            _ => Err(()),
        }
    }
}

/// 同步周期
///
/// 由编排器创建和修改，整体持久化到状态记录供看门狗只读观察
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCycle {
    /// 周期标识
    pub cycle_id: Option<String>,
    /// 同步模式
    pub mode: Option<SyncMode>,
    /// 周期状态
    pub status: CycleStatus,
    /// 当前模型
    pub current_model: Option<String>,
    /// 当前页
    pub current_page: Option<u32>,
    /// 累计处理记录数
    pub records_processed: u64,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 最近心跳
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// 最近错误
    pub last_error: Option<String>,
    /// 最近写入时间
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncCycle {
    /// 创建空闲周期
    pub fn new(mode: SyncMode) -> Self {
        Self {
            cycle_id: Some(Uuid::new_v4().to_string()),
            mode: Some(mode),
            status: CycleStatus::Idle,
            current_model: None,
            current_page: None,
            records_processed: 0,
            started_at: None,
            finished_at: None,
            last_heartbeat: None,
            last_error: None,
            updated_at: None,
        }
    }

    fn transition(&mut self, from: CycleStatus, to: CycleStatus) -> Result<(), SyncError> {
        if self.status != from {
            return Err(SyncError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// 启动周期
    ///
    /// 将状态从Idle变更为Running
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.transition(CycleStatus::Idle, CycleStatus::Running)?;
        self.started_at = Some(now);
        self.last_heartbeat = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    /// 记录心跳
    pub fn heartbeat(
        &mut self,
        model: &str,
        page: u32,
        records_processed: u64,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        if self.status != CycleStatus::Running {
            return Err(SyncError::InvalidTransition {
                from: self.status,
                to: CycleStatus::Running,
            });
        }
        self.current_model = Some(model.to_string());
        self.current_page = Some(page);
        self.records_processed = records_processed;
        self.last_heartbeat = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    /// 完成周期
    ///
    /// 将状态从Running变更为Success
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.transition(CycleStatus::Running, CycleStatus::Success)?;
        self.finished_at = Some(now);
        self.last_heartbeat = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    /// 标记周期失败
    ///
    /// 将状态从Running变更为Failed，并记录错误
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.transition(CycleStatus::Running, CycleStatus::Failed)?;
        self.last_error = Some(error.into());
        self.finished_at = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.status == CycleStatus::Running
    }
}
