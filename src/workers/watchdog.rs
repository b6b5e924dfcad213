// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::settings::WatchdogSettings;
use crate::domain::models::status_report::StatusReport;
use crate::domain::repositories::sync_status_repository::SyncStatusRepository;
use crate::infrastructure::process::{ProcessExit, ProcessLauncher, SupervisedProcess};
use crate::utils::errors::{RepositoryError, WatchdogError};

/// 同步状态探针
///
/// 看门狗只通过发布的状态观察同步进程
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self) -> Result<StatusReport, RepositoryError>;
}

/// 从状态仓库读取并按阈值计算停滞
pub struct StoreStatusProbe {
    repository: Arc<dyn SyncStatusRepository>,
    stale_threshold_seconds: i64,
}

impl StoreStatusProbe {
    pub fn new(repository: Arc<dyn SyncStatusRepository>, stale_threshold_seconds: i64) -> Self {
        Self {
            repository,
            stale_threshold_seconds,
        }
    }
}

#[async_trait]
impl StatusProbe for StoreStatusProbe {
    async fn probe(&self) -> Result<StatusReport, RepositoryError> {
        let cycle = self.repository.load().await?;
        Ok(StatusReport::build(
            cycle.as_ref(),
            Utc::now(),
            self.stale_threshold_seconds,
        ))
    }
}

/// 看门狗配置
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub poll: Duration,
    pub status_timeout: Duration,
    pub startup_grace: Duration,
    pub max_stale_count: u32,
    pub term_grace: Duration,
}

impl From<&WatchdogSettings> for WatchdogConfig {
    fn from(settings: &WatchdogSettings) -> Self {
        Self {
            enabled: settings.enabled,
            poll: Duration::from_secs(settings.poll_seconds),
            status_timeout: Duration::from_secs(settings.status_timeout_seconds),
            startup_grace: Duration::from_secs(settings.startup_grace_seconds),
            max_stale_count: settings.max_stale_count.max(1),
            term_grace: Duration::from_secs(settings.term_grace_seconds),
        }
    }
}

/// 一次监管的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// 进程自行退出
    Exited(ProcessExit),
    /// 进程被看门狗终止
    Terminated { forced: bool },
}

impl SupervisionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, SupervisionOutcome::Exited(exit) if exit.success())
    }
}

/// 看门狗
///
/// 按轮询间隔检查状态，连续停滞达到上限时先发送 SIGTERM，
/// 宽限期后仍未退出再发送 SIGKILL
pub struct Watchdog {
    probe: Arc<dyn StatusProbe>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(probe: Arc<dyn StatusProbe>, config: WatchdogConfig) -> Self {
        Self { probe, config }
    }

    /// 监管一个运行中的进程直到其退出或被终止
    pub async fn supervise(
        &self,
        process: &mut dyn SupervisedProcess,
    ) -> Result<SupervisionOutcome, WatchdogError> {
        let launched = Instant::now();
        let mut stale_count: u32 = 0;

        loop {
            if let Some(exit) = process.wait_timeout(self.config.poll).await? {
                return Ok(SupervisionOutcome::Exited(exit));
            }

            if !self.config.enabled || launched.elapsed() < self.config.startup_grace {
                continue;
            }

            match self.check().await {
                Ok(true) => {
                    stale_count += 1;
                    warn!(
                        "watchdog stale sync status count={}/{}",
                        stale_count, self.config.max_stale_count
                    );
                    if stale_count >= self.config.max_stale_count {
                        error!(
                            "watchdog detected stale sync status after {} consecutive stale checks",
                            stale_count
                        );
                        let forced = self.terminate(process).await?;
                        return Ok(SupervisionOutcome::Terminated { forced });
                    }
                }
                Ok(false) => stale_count = 0,
                Err(WatchdogError::StatusTimeout) => {
                    warn!("watchdog status check timed out");
                }
                Err(e) => {
                    warn!("watchdog status check failed: {}", e);
                }
            }
        }
    }

    async fn check(&self) -> Result<bool, WatchdogError> {
        let report = tokio::time::timeout(self.config.status_timeout, self.probe.probe())
            .await
            .map_err(|_| WatchdogError::StatusTimeout)??;
        Ok(report.is_stale)
    }

    /// 终止进程
    ///
    /// # 返回值
    ///
    /// 是否使用了 SIGKILL
    async fn terminate(&self, process: &mut dyn SupervisedProcess) -> Result<bool, WatchdogError> {
        info!("Sending SIGTERM to sync process (pid={:?})", process.id());
        if let Err(e) = process.terminate() {
            warn!("Failed to send SIGTERM: {}", e);
        }

        let forced = match process.wait_timeout(self.config.term_grace).await? {
            Some(_) => false,
            None => {
                warn!(
                    "sync process still running {}s after SIGTERM; forcing SIGKILL",
                    self.config.term_grace.as_secs()
                );
                process.kill()?;
                process.wait().await?;
                true
            }
        };

        counter!("watchdog_terminations_total", "forced" => forced.to_string()).increment(1);
        Ok(forced)
    }
}

/// 同步循环
///
/// 启动同步进程并监管，成功后等待 `interval`，失败或被终止后等待 `failure_sleep`
pub struct SyncSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    watchdog: Watchdog,
    interval: Duration,
    failure_sleep: Duration,
}

impl SyncSupervisor {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        watchdog: Watchdog,
        interval: Duration,
        failure_sleep: Duration,
    ) -> Self {
        Self {
            launcher,
            watchdog,
            interval,
            failure_sleep,
        }
    }

    /// 执行一次同步并返回结果
    pub async fn run_once(&self) -> Result<SupervisionOutcome, WatchdogError> {
        info!("SYNC_LOOP start");
        let started = Instant::now();
        let mut process = self.launcher.launch()?;
        let outcome = self.watchdog.supervise(process.as_mut()).await?;
        info!(
            "SYNC_LOOP done elapsed_seconds={} outcome={:?}",
            started.elapsed().as_secs(),
            outcome
        );
        Ok(outcome)
    }

    /// 持续运行同步循环
    ///
    /// # 参数
    ///
    /// * `max_cycles` - 最多执行的周期数，`None` 表示不限
    ///
    /// 启动或监督失败按失败周期处理，冷却后继续
    pub async fn run(&self, max_cycles: Option<usize>) {
        let mut cycles = 0;
        loop {
            let succeeded = match self.run_once().await {
                Ok(outcome) => outcome.succeeded(),
                Err(e) => {
                    error!("Sync supervision failed: {}", e);
                    false
                }
            };
            cycles += 1;

            let sleep = if succeeded {
                info!("Sync finished; sleeping for {}s before next cycle.", self.interval.as_secs());
                self.interval
            } else {
                error!(
                    "Import failed; sleeping for {}s before next attempt.",
                    self.failure_sleep.as_secs()
                );
                self.failure_sleep
            };

            if max_cycles.is_some_and(|max| cycles >= max) {
                return;
            }
            tokio::time::sleep(sleep).await;
        }
    }
}

#[cfg(test)]
#[path = "watchdog_test.rs"]
mod tests;
