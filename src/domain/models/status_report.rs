// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::sync_cycle::{CycleStatus, SyncCycle};

/// 对外发布的同步状态
///
/// 序列化为单行 JSON，键按字母排序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub mode: Option<String>,
    pub cycle_id: Option<String>,
    pub current_model: Option<String>,
    pub current_page: Option<u32>,
    pub records_processed: u64,
    pub cycle_started_at: Option<String>,
    pub cycle_finished_at: Option<String>,
    pub last_heartbeat: Option<String>,
    pub last_error: Option<String>,
    pub cycle_age_seconds: Option<i64>,
    pub heartbeat_age_seconds: Option<i64>,
    pub is_stale: bool,
    pub updated_at: Option<String>,
}

fn iso(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, false))
}

impl StatusReport {
    /// 没有状态记录时的报告
    pub fn unknown() -> Self {
        Self {
            status: "unknown".to_string(),
            mode: None,
            cycle_id: None,
            current_model: None,
            current_page: None,
            records_processed: 0,
            cycle_started_at: None,
            cycle_finished_at: None,
            last_heartbeat: None,
            last_error: None,
            cycle_age_seconds: None,
            heartbeat_age_seconds: None,
            is_stale: false,
            updated_at: None,
        }
    }

    /// 根据状态记录构建报告
    ///
    /// # 参数
    ///
    /// * `cycle` - 状态记录，`None` 表示尚未写入
    /// * `now` - 当前时间
    /// * `stale_threshold_seconds` - 停滞阈值，非正数表示不检测
    pub fn build(cycle: Option<&SyncCycle>, now: DateTime<Utc>, stale_threshold_seconds: i64) -> Self {
        let Some(cycle) = cycle else {
            return Self::unknown();
        };

        let running = cycle.status == CycleStatus::Running;
        let cycle_age_seconds = cycle.started_at.map(|started| {
            let end = if running {
                now
            } else {
                cycle.finished_at.unwrap_or(now)
            };
            (end - started).num_seconds().max(0)
        });
        let heartbeat_age_seconds = cycle
            .last_heartbeat
            .map(|heartbeat| (now - heartbeat).num_seconds().max(0));

        let is_stale = running
            && stale_threshold_seconds > 0
            && heartbeat_age_seconds.is_some_and(|age| age > stale_threshold_seconds);

        Self {
            status: cycle.status.to_string(),
            mode: cycle.mode.map(|m| m.to_string()),
            cycle_id: cycle.cycle_id.clone(),
            current_model: cycle.current_model.clone(),
            current_page: cycle.current_page,
            records_processed: cycle.records_processed,
            cycle_started_at: iso(cycle.started_at),
            cycle_finished_at: iso(cycle.finished_at),
            last_heartbeat: iso(cycle.last_heartbeat),
            last_error: cycle.last_error.clone(),
            cycle_age_seconds,
            heartbeat_age_seconds,
            is_stale,
            updated_at: iso(cycle.updated_at),
        }
    }

    /// 单行 JSON，键按字母排序
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&value)
    }
}
