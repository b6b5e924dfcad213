// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::settings::Settings;
use crate::engines::fetcher::{ApiCallStats, ResilientFetcher};
use crate::engines::request_window::RequestWindow;
use crate::engines::reqwest_engine::ReqwestTransport;
use crate::engines::traits::{FetchError, HttpMethod, QueryParams};
use crate::infrastructure::cache::response_cache::{
    list_key, object_key, CacheEntry, PageMeta, ResponseCache,
};
use crate::utils::errors::SyncError;
use crate::utils::retry_policy::RetryPolicy;

/// 一页列表结果
pub type ListPage = (Vec<Value>, Option<PageMeta>);

/// 厂商 API 客户端
///
/// 组合弹性请求器与周期缓存。缓存、滑动窗口和预取标记都由实例独占，
/// 缓存和预取标记通过 [`VendorClient::clear_cache`] 显式重置。
pub struct VendorClient {
    pub(crate) fetcher: ResilientFetcher,
    pub(crate) base_url: String,
    pub(crate) cache: ResponseCache,
    pub(crate) stats: ApiCallStats,
    pub(crate) prefetched: HashSet<String>,
    pub(crate) source_updated_at: Option<DateTime<Utc>>,
    pub(crate) prefetch_skip_window: chrono::Duration,
    pub(crate) prefetch_page_size: u32,
}

impl VendorClient {
    /// 创建客户端
    ///
    /// # 参数
    ///
    /// * `fetcher` - 弹性请求器
    /// * `base_url` - API 基础地址，例如 `https://acme.repairshopr.com/api/v1`
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: ResponseCache::new(),
            stats: ApiCallStats::default(),
            prefetched: HashSet::new(),
            source_updated_at: None,
            prefetch_skip_window: chrono::Duration::weeks(52),
            prefetch_page_size: 100,
        }
    }

    /// 按配置构建使用 reqwest 传输的客户端
    pub fn from_settings(settings: &Settings) -> Result<Self, SyncError> {
        let base_url = settings.vendor.resolve_base_url()?;
        let token = settings.vendor.require_token()?;
        let transport = ReqwestTransport::new(
            token,
            Duration::from_secs(settings.vendor.request_timeout_seconds),
        )
        .map_err(FetchError::from)?;

        let window = RequestWindow::new(
            settings.rate_limiting.requests_per_minute,
            Duration::from_secs(settings.rate_limiting.window_seconds),
        );
        let fetcher = ResilientFetcher::new(
            Arc::new(transport),
            window,
            RetryPolicy::from(&settings.retry),
        );

        Ok(Self::new(fetcher, base_url)
            .with_prefetch_skip_window(chrono::Duration::weeks(settings.sync.prefetch_skip_weeks))
            .with_prefetch_page_size(settings.sync.prefetch_page_size))
    }

    /// 设置跳过预取的时间窗口
    pub fn with_prefetch_skip_window(mut self, window: chrono::Duration) -> Self {
        self.prefetch_skip_window = window;
        self
    }

    /// 设置预取分页大小
    pub fn with_prefetch_page_size(mut self, page_size: u32) -> Self {
        self.prefetch_page_size = page_size.max(1);
        self
    }

    /// 开始新周期
    ///
    /// 清空缓存并记录本周期的来源水位线
    pub fn begin_cycle(&mut self, source_updated_at: Option<DateTime<Utc>>) {
        self.clear_cache();
        self.stats.clear();
        self.source_updated_at = source_updated_at;
    }

    /// 清空缓存和预取标记
    ///
    /// 滑动窗口不受影响，限流跨越缓存清理持续生效
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.prefetched.clear();
    }

    /// 本周期的来源水位线
    pub fn source_updated_at(&self) -> Option<DateTime<Utc>> {
        self.source_updated_at
    }

    /// 调用统计
    pub fn stats(&self) -> &ApiCallStats {
        &self.stats
    }

    /// 输出调用统计和限流休眠时间
    pub fn log_api_stats(&self) {
        self.stats.log_summary();
        info!(
            "API rate limit sleep total: {:.2}s",
            self.fetcher.api_sleep_time().as_secs_f64()
        );
    }

    /// 缓存条目数
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// 拉取一页列表
    ///
    /// 相同 (model, params) 在一个周期内只请求一次
    ///
    /// # 参数
    ///
    /// * `model` - 模型名，例如 `line_item`
    /// * `params` - 查询参数
    ///
    /// # 返回值
    ///
    /// * `Ok((rows, meta))` - 行数据（对象或数组）和分页元数据
    /// * `Err(FetchError)` - 请求失败或结构不符
    pub async fn fetch_list(&mut self, model: &str, params: &QueryParams) -> Result<ListPage, FetchError> {
        let key = list_key(model, params);
        match self.cache.get(&key) {
            Some(CacheEntry::List { rows, meta }) => return Ok((rows.clone(), meta.clone())),
            Some(CacheEntry::Object(_)) => {
                return Err(FetchError::malformed(format!(
                    "Unexpected cache payload type for {}",
                    key
                )))
            }
            None => {}
        }

        let url = format!("{}/{}s", self.base_url, model);
        let started = Instant::now();
        let response = self.fetcher.request(HttpMethod::Get, &url, params).await?;
        self.stats.record(&format!("{}s_bulk", model), started.elapsed());

        let (rows, meta) = parse_list_payload(model, response.json()?)?;
        debug!(
            "fetched {} {} rows (total_pages={:?})",
            rows.len(),
            model,
            meta.as_ref().and_then(|m| m.total_pages)
        );

        self.cache.insert(
            key,
            CacheEntry::List {
                rows: rows.clone(),
                meta: meta.clone(),
            },
        );
        Ok((rows, meta))
    }

    /// 按 id 拉取单个对象
    ///
    /// 响应体可以用模型名（`line_item`）或去掉下划线的小写名（`lineitem`）作为键
    pub async fn fetch_by_id(&mut self, model: &str, id: i64) -> Result<Map<String, Value>, FetchError> {
        let key = object_key(model, id);
        match self.cache.get(&key) {
            Some(CacheEntry::Object(object)) => return Ok(object.clone()),
            Some(CacheEntry::List { .. }) => {
                return Err(FetchError::malformed(format!(
                    "Unexpected cache payload type for {}",
                    key
                )))
            }
            None => {}
        }

        let url = format!("{}/{}s/{}", self.base_url, model, id);
        let started = Instant::now();
        let response = self
            .fetcher
            .request(HttpMethod::Get, &url, &QueryParams::new())
            .await?;
        self.stats.record(&format!("{}s_by_id", model), started.elapsed());

        let object = parse_object_payload(model, id, response.json()?)?;
        self.cache.insert(key, CacheEntry::Object(object.clone()));
        Ok(object)
    }

    /// 拉取工单设置（工单类型、类型字段和字段答案）
    ///
    /// 结果不缓存，每次调用都会请求
    pub async fn fetch_ticket_settings(&mut self) -> Result<Map<String, Value>, FetchError> {
        let url = format!("{}/tickets/settings", self.base_url);
        let started = Instant::now();
        let response = self
            .fetcher
            .request(HttpMethod::Get, &url, &QueryParams::new())
            .await?;
        self.stats.record("ticket_settings", started.elapsed());

        match response.json()? {
            Value::Object(settings) => Ok(settings),
            _ => Err(FetchError::malformed(
                "Unexpected RepairShopr ticket settings payload".to_string(),
            )),
        }
    }

    /// 写入单对象缓存
    pub(crate) fn seed_object(&mut self, model: &str, id: i64, object: Map<String, Value>) {
        self.cache.insert(object_key(model, id), CacheEntry::Object(object));
    }

    /// 写入列表缓存
    pub(crate) fn seed_list(&mut self, model: &str, params: &QueryParams, rows: Vec<Value>, meta: PageMeta) {
        self.cache.insert(
            list_key(model, params),
            CacheEntry::List {
                rows,
                meta: Some(meta),
            },
        );
    }
}

/// 校验列表响应结构
pub fn parse_list_payload(model: &str, payload: Value) -> Result<ListPage, FetchError> {
    let Value::Object(mut body) = payload else {
        return Err(FetchError::malformed(format!(
            "Unexpected payload type for {}s",
            model
        )));
    };

    let collection = format!("{}s", model);
    let rows = match body.remove(&collection) {
        Some(Value::Array(rows)) => rows,
        _ => {
            return Err(FetchError::malformed(format!(
                "Missing or invalid '{}' list",
                collection
            )))
        }
    };

    if rows.iter().any(|row| !(row.is_object() || row.is_array())) {
        return Err(FetchError::malformed(format!(
            "Invalid item payload type in '{}'",
            collection
        )));
    }

    let meta = match body.remove("meta") {
        None | Some(Value::Null) => None,
        Some(Value::Object(meta)) => Some(PageMeta::from_map(meta)),
        Some(_) => {
            return Err(FetchError::malformed(format!(
                "Invalid 'meta' payload type for '{}'",
                collection
            )))
        }
    };

    Ok((rows, meta))
}

/// 校验单对象响应结构
pub fn parse_object_payload(model: &str, id: i64, payload: Value) -> Result<Map<String, Value>, FetchError> {
    let Value::Object(mut body) = payload else {
        return Err(FetchError::malformed(format!(
            "Unexpected payload type for {} {}",
            model, id
        )));
    };

    let compact = model.replace('_', "");
    let candidate = body.remove(model).or_else(|| body.remove(&compact));
    let object = match candidate {
        Some(Value::Object(object)) => object,
        _ => {
            return Err(FetchError::malformed(format!(
                "Could not locate model payload for {} {}",
                model, id
            )))
        }
    };

    if object.is_empty() {
        return Err(FetchError::NotFound(format!(
            "Could not find {} with id {}",
            display_name(model),
            id
        )));
    }

    Ok(object)
}

/// `line_item` -> `LineItem`
fn display_name(model: &str) -> String {
    model
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
