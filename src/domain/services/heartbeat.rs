// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::settings::SyncSettings;

/// 心跳写入策略
///
/// 满足任一条件即写入：
/// - 累计处理记录数比上次写入增加了 `record_delta`
/// - 当前页是 `page_multiple` 的倍数且比上次写入前进了
/// - 距上次写入超过 `interval`
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatPolicy {
    pub record_delta: u64,
    pub page_multiple: u32,
    pub interval: Duration,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            record_delta: 100,
            page_multiple: 10,
            interval: Duration::from_secs(30),
        }
    }
}

impl From<&SyncSettings> for HeartbeatPolicy {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            record_delta: settings.heartbeat_record_delta,
            page_multiple: settings.heartbeat_page_multiple,
            interval: Duration::from_secs(settings.heartbeat_interval_seconds),
        }
    }
}

/// 心跳节流器
#[derive(Debug)]
pub struct HeartbeatTracker {
    policy: HeartbeatPolicy,
    last_records: u64,
    last_position: Option<(String, u32)>,
    last_write: Option<Instant>,
}

impl HeartbeatTracker {
    pub fn new(policy: HeartbeatPolicy) -> Self {
        Self {
            policy,
            last_records: 0,
            last_position: None,
            last_write: None,
        }
    }

    /// 判断本次进度是否需要写入心跳
    pub fn should_write(&self, model: &str, page: u32, records_processed: u64, now: Instant) -> bool {
        let Some(last_write) = self.last_write else {
            return true;
        };

        if records_processed.saturating_sub(self.last_records) >= self.policy.record_delta {
            return true;
        }

        let advanced = match &self.last_position {
            Some((last_model, last_page)) => last_model != model || page > *last_page,
            None => true,
        };
        if self.policy.page_multiple > 0 && page % self.policy.page_multiple == 0 && advanced {
            return true;
        }

        now.saturating_duration_since(last_write) >= self.policy.interval
    }

    /// 记录一次心跳写入
    pub fn mark_written(&mut self, model: &str, page: u32, records_processed: u64, now: Instant) {
        self.last_records = records_processed;
        self.last_position = Some((model.to_string(), page));
        self.last_write = Some(now);
    }
}
