// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// 请求滑动窗口
///
/// 记录最近窗口期内发出的请求时间，用于限制每分钟请求数。
/// 只保存比窗口更新的时间戳。
#[derive(Debug)]
pub struct RequestWindow {
    limit: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RequestWindow {
    /// 创建滑动窗口
    ///
    /// # 参数
    ///
    /// * `limit` - 窗口内允许的最大请求数
    /// * `window` - 窗口长度
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            timestamps: VecDeque::with_capacity(limit),
        }
    }

    /// 清除已过期的时间戳
    pub fn purge(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// 计算发出下一次请求前需要等待的时间
    ///
    /// 窗口未满时返回 `Duration::ZERO`
    pub fn wait_time(&mut self, now: Instant) -> Duration {
        self.purge(now);
        if self.timestamps.len() < self.limit {
            return Duration::ZERO;
        }
        match self.timestamps.front() {
            Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// 记录一次请求
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// 当前窗口内的请求数
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// 窗口内最早的请求时间
    pub fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }
}

#[cfg(test)]
#[path = "request_window_test.rs"]
mod tests;
