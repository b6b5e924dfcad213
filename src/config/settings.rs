// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Utc};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;
use validator::Validate;

use crate::utils::errors::SyncError;

/// 应用程序配置设置
///
/// 包含数据库、厂商 API、速率限制、重试、同步、状态、看门狗和对账等所有配置项
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// 数据库配置
    #[validate(nested)]
    pub database: DatabaseSettings,
    /// 厂商 API 配置
    #[validate(nested)]
    pub vendor: VendorSettings,
    /// 速率限制配置
    #[validate(nested)]
    pub rate_limiting: RateLimitingSettings,
    /// 重试配置
    #[validate(nested)]
    pub retry: RetrySettings,
    /// 同步周期配置
    #[validate(nested)]
    pub sync: SyncSettings,
    /// 状态输出配置
    pub status: StatusSettings,
    /// 看门狗配置
    #[validate(nested)]
    pub watchdog: WatchdogSettings,
    /// 对账配置
    #[validate(nested)]
    pub reconcile: ReconcileSettings,
    /// 日志配置
    pub logging: LoggingSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    #[validate(length(min = 1))]
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 厂商 API 配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VendorSettings {
    /// 完整的 API 基础地址，优先于 `url_store_name`
    #[validate(url)]
    pub base_url: Option<String>,
    /// 店铺子域名，拼接为 `https://{name}.repairshopr.com/api/v1`
    pub url_store_name: Option<String>,
    /// API 令牌
    pub token: Option<String>,
    /// 单次请求超时时间（秒）
    #[validate(range(min = 1))]
    pub request_timeout_seconds: u64,
}

impl VendorSettings {
    /// 解析 API 基础地址
    pub fn resolve_base_url(&self) -> Result<String, SyncError> {
        if let Some(base_url) = self.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            let parsed = Url::parse(base_url).map_err(|e| {
                SyncError::Configuration(format!("invalid vendor.base_url {}: {}", base_url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SyncError::Configuration(format!(
                    "vendor.base_url must use http or https: {}",
                    base_url
                )));
            }
            return Ok(base_url.trim_end_matches('/').to_string());
        }
        match self.url_store_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(format!("https://{}.repairshopr.com/api/v1", name)),
            _ => Err(SyncError::Configuration(
                "vendor.base_url or vendor.url_store_name must be provided".to_string(),
            )),
        }
    }

    /// 获取 API 令牌
    pub fn require_token(&self) -> Result<&str, SyncError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Configuration("vendor.token must be provided".to_string()))
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateLimitingSettings {
    /// 滑动窗口内允许的请求数
    #[validate(range(min = 1))]
    pub requests_per_minute: usize,
    /// 滑动窗口长度（秒）
    #[validate(range(min = 1))]
    pub window_seconds: u64,
}

/// 重试配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RetrySettings {
    /// 最大尝试次数（包含首次请求）
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    /// 初始退避时间（秒）
    #[validate(range(min = 0.0))]
    pub initial_backoff_seconds: f64,
    /// 最大退避时间（秒）
    #[validate(range(min = 0.0))]
    pub max_backoff_seconds: f64,
    /// 退避乘数
    #[validate(range(min = 1.0))]
    pub backoff_multiplier: f64,
    /// 抖动因子，0 表示不加抖动
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter_factor: f64,
}

/// 一致性校验失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityPolicy {
    /// 全量同步时校验失败即周期失败
    FailFullSync,
    /// 仅记录日志
    LogOnly,
}

/// 同步周期配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SyncSettings {
    /// 允许尾页窗口优化的最早水位线
    pub baseline_epoch: DateTime<Utc>,
    /// 水位线在该周数以内时跳过子集合预取
    #[validate(range(min = 0))]
    pub prefetch_skip_weeks: i64,
    /// 预取分页大小
    #[validate(range(min = 1))]
    pub prefetch_page_size: u32,
    /// 强制全量同步
    pub force_full: bool,
    /// 逗号分隔的模型列表，为空时同步全部模型
    pub models: Option<String>,
    /// 一致性校验策略
    pub parity_policy: ParityPolicy,
    /// 绝对容差
    pub parity_absolute_tolerance: u64,
    /// 相对容差
    #[validate(range(min = 0.0, max = 1.0))]
    pub parity_relative_tolerance: f64,
    /// 最近更新的抽样父记录数
    pub parity_recent_samples: u64,
    /// 按 id 均匀分布的抽样父记录数
    pub parity_spread_samples: u64,
    /// 报告中保留的最大不一致样本数
    pub parity_max_mismatches: usize,
    /// 心跳：累计记录增量阈值
    #[validate(range(min = 1))]
    pub heartbeat_record_delta: u64,
    /// 心跳：页码倍数
    #[validate(range(min = 1))]
    pub heartbeat_page_multiple: u32,
    /// 心跳：最大写入间隔（秒）
    #[validate(range(min = 1))]
    pub heartbeat_interval_seconds: u64,
}

impl SyncSettings {
    /// 解析模型过滤列表
    pub fn selected_models(&self) -> Vec<String> {
        self.models
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

/// 状态输出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSettings {
    /// 心跳超过该秒数视为停滞，0 表示不检测
    pub stale_threshold_seconds: i64,
    /// 检测到停滞时以非零状态码退出
    pub fail_on_stale: bool,
}

/// 看门狗配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WatchdogSettings {
    /// 是否启用停滞检测
    pub enabled: bool,
    /// 轮询间隔（秒）
    #[validate(range(min = 1))]
    pub poll_seconds: u64,
    /// 单次状态查询超时（秒）
    #[validate(range(min = 1))]
    pub status_timeout_seconds: u64,
    /// 同步进程启动后的宽限期（秒）
    pub startup_grace_seconds: u64,
    /// 连续停滞次数上限
    #[validate(range(min = 1))]
    pub max_stale_count: u32,
    /// SIGTERM 后等待进程退出的时间（秒）
    pub term_grace_seconds: u64,
    /// 心跳停滞阈值（秒）
    #[validate(range(min = 1))]
    pub stale_heartbeat_seconds: i64,
    /// 成功后到下一次同步的间隔（秒）
    pub interval_seconds: u64,
    /// 失败或被终止后的冷却时间（秒）
    pub failure_sleep_seconds: u64,
    /// 同步命令，空时使用当前目录下的 `repairshopr-sync`
    pub command: Option<String>,
    /// 等待数据库的重试次数
    #[validate(range(min = 1))]
    pub db_wait_retries: u32,
    /// 等待数据库的间隔（秒）
    pub db_wait_seconds: u64,
}

/// 对账配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReconcileSettings {
    /// 是否执行修复
    pub apply: bool,
    /// 起始页
    #[validate(range(min = 1))]
    pub page_start: u32,
    /// 结束页，0 表示直到最后一页
    pub page_end: u32,
    /// 每隔多少页输出一次扫描进度
    #[validate(range(min = 1))]
    pub progress_every: u32,
    /// 最多修复的父记录数，0 表示不限制
    pub max_repair_parents: usize,
    /// 是否统计本地存在但厂商不存在的 id
    pub compute_db_not_in_api: bool,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 输出格式
    pub format: LogFormat,
    /// EnvFilter 过滤规则
    pub filter: Option<String>,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启动 Prometheus 导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `REPAIRSHOPR_SYNC__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载或校验失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("REPAIRSHOPR_SYNC").separator("__"));

        Self::finish(builder)
    }

    /// 在默认值之上应用覆盖项，不读取文件和环境变量
    pub fn with_overrides(overrides: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Default DB pool settings
            .set_default("database.url", "sqlite://repairshopr_sync.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Vendor
            .set_default("vendor.request_timeout_seconds", 60)?
            // Rate limiting and retry
            .set_default("rate_limiting.requests_per_minute", 150)?
            .set_default("rate_limiting.window_seconds", 60)?
            .set_default("retry.max_attempts", 6)?
            .set_default("retry.initial_backoff_seconds", 2.0)?
            .set_default("retry.max_backoff_seconds", 30.0)?
            .set_default("retry.backoff_multiplier", 2.0)?
            .set_default("retry.jitter_factor", 0.0)?
            // Sync cycle
            .set_default("sync.baseline_epoch", "2010-01-01T00:00:00Z")?
            .set_default("sync.prefetch_skip_weeks", 52)?
            .set_default("sync.prefetch_page_size", 100)?
            .set_default("sync.force_full", false)?
            .set_default("sync.parity_policy", "fail_full_sync")?
            .set_default("sync.parity_absolute_tolerance", 5)?
            .set_default("sync.parity_relative_tolerance", 0.001)?
            .set_default("sync.parity_recent_samples", 5)?
            .set_default("sync.parity_spread_samples", 5)?
            .set_default("sync.parity_max_mismatches", 20)?
            .set_default("sync.heartbeat_record_delta", 100)?
            .set_default("sync.heartbeat_page_multiple", 10)?
            .set_default("sync.heartbeat_interval_seconds", 30)?
            // Status surface
            .set_default("status.stale_threshold_seconds", 0)?
            .set_default("status.fail_on_stale", false)?
            // Watchdog
            .set_default("watchdog.enabled", true)?
            .set_default("watchdog.poll_seconds", 30)?
            .set_default("watchdog.status_timeout_seconds", 10)?
            .set_default("watchdog.startup_grace_seconds", 120)?
            .set_default("watchdog.max_stale_count", 3)?
            .set_default("watchdog.term_grace_seconds", 30)?
            .set_default("watchdog.stale_heartbeat_seconds", 900)?
            .set_default("watchdog.interval_seconds", 3600)?
            .set_default("watchdog.failure_sleep_seconds", 300)?
            .set_default("watchdog.db_wait_retries", 30)?
            .set_default("watchdog.db_wait_seconds", 2)?
            // Reconcile
            .set_default("reconcile.apply", false)?
            .set_default("reconcile.page_start", 1)?
            .set_default("reconcile.page_end", 0)?
            .set_default("reconcile.progress_every", 25)?
            .set_default("reconcile.max_repair_parents", 0)?
            .set_default("reconcile.compute_db_not_in_api", false)?
            // Observability
            .set_default("logging.format", "text")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
