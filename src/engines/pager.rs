// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::engines::api_client::VendorClient;
use crate::engines::traits::{FetchError, QueryParams};
use crate::infrastructure::cache::response_cache::{list_key, PageMeta};
use crate::utils::errors::SyncError;

/// `since_updated_at` 的格式，UTC 微秒精度
pub const SINCE_UPDATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// 进度事件
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// 模型名
    pub model: String,
    /// 当前页
    pub page: u32,
    /// 累计处理记录数
    pub records_processed: u64,
    /// 本页记录数
    pub rows_on_page: u64,
    /// 分页元数据，预取阶段带 `stage`
    pub meta: Option<PageMeta>,
}

impl ProgressEvent {
    /// 预取阶段名
    pub fn stage(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.raw.get("stage"))
            .and_then(Value::as_str)
    }
}

/// 进度观察者
#[async_trait]
pub trait ProgressObserver: Send {
    async fn on_progress(&mut self, event: &ProgressEvent) -> Result<(), SyncError>;
}

/// 忽略所有进度事件
pub struct NoopObserver;

#[async_trait]
impl ProgressObserver for NoopObserver {
    async fn on_progress(&mut self, _event: &ProgressEvent) -> Result<(), SyncError> {
        Ok(())
    }
}

/// 一页结果
#[derive(Debug, Clone)]
pub struct Page {
    pub number: u32,
    pub rows: Vec<Value>,
    pub meta: Option<PageMeta>,
}

/// 分页游标
///
/// 第 1 页之后如果设置了尾页窗口，直接跳到 `max(2, total - n + 1)`
#[derive(Debug, Clone)]
pub struct PageCursor {
    model: String,
    params: QueryParams,
    next: Option<u32>,
    total_pages: Option<u32>,
    tail_window: Option<u32>,
    requested: Vec<u32>,
}

impl PageCursor {
    /// 创建游标
    ///
    /// # 参数
    ///
    /// * `model` - 模型名
    /// * `params` - 额外查询参数（排序、过滤）
    /// * `since` - 增量起点，写入 `since_updated_at`
    /// * `tail_window` - 只取最后 N 页
    pub fn new(
        model: impl Into<String>,
        mut params: QueryParams,
        since: Option<DateTime<Utc>>,
        tail_window: Option<u32>,
    ) -> Self {
        if let Some(since) = since {
            params.insert(
                "since_updated_at".to_string(),
                since.format(SINCE_UPDATED_AT_FORMAT).to_string(),
            );
        }
        Self {
            model: model.into(),
            params,
            next: Some(1),
            total_pages: None,
            tail_window: tail_window.filter(|n| *n > 0),
            requested: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 已知的总页数
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// 已请求的页码
    pub fn requested_pages(&self) -> &[u32] {
        &self.requested
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    fn params_for(&self, page: u32) -> QueryParams {
        let mut params = self.params.clone();
        params.insert("page".to_string(), page.to_string());
        params
    }

    fn advance(&mut self, page: u32, total_pages: Option<u32>) {
        self.requested.push(page);
        self.total_pages = total_pages;
        self.next = match total_pages {
            Some(total) if page < total => match self.tail_window {
                Some(n) if page == 1 => Some(2.max(total.saturating_sub(n) + 1)),
                _ => Some(page + 1),
            },
            _ => None,
        };
    }
}

impl VendorClient {
    /// 拉取游标的下一页
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(Page))` - 下一页
    /// * `Ok(None)` - 已到最后一页
    /// * `Err(FetchError)` - 请求失败
    pub async fn next_page(&mut self, cursor: &mut PageCursor) -> Result<Option<Page>, FetchError> {
        let Some(page) = cursor.next else {
            return Ok(None);
        };

        let params = cursor.params_for(page);
        let (rows, meta) = self.fetch_list(&cursor.model, &params).await?;
        cursor.advance(page, meta.as_ref().and_then(|m| m.total_pages));

        Ok(Some(Page {
            number: page,
            rows,
            meta,
        }))
    }

    /// 拉取全部页
    pub async fn fetch_all(&mut self, cursor: &mut PageCursor) -> Result<Vec<Value>, FetchError> {
        let mut rows = Vec::new();
        while let Some(page) = self.next_page(cursor).await? {
            rows.extend(page.rows);
        }
        Ok(rows)
    }

    /// 按父记录拉取子集合
    ///
    /// 第 1 页只带父键，后续页再带 `page`。预取完成后缓存未命中表示没有子记录。
    pub async fn fetch_children(
        &mut self,
        child_model: &str,
        parent_key: &str,
        parent_id: i64,
    ) -> Result<Vec<Map<String, Value>>, FetchError> {
        let prefetched = self.prefetched.contains(child_model);
        let mut children = Vec::new();
        let mut page: u32 = 1;

        loop {
            let params = child_params(parent_key, parent_id, page);
            if prefetched && !self.cache.contains(&list_key(child_model, &params)) {
                break;
            }

            let (rows, meta) = self.fetch_list(child_model, &params).await?;
            for row in rows {
                let Value::Object(object) = row else {
                    continue;
                };
                if let Some(id) = object.get("id").and_then(Value::as_i64) {
                    self.seed_object(child_model, id, object.clone());
                }
                children.push(object);
            }

            match meta.and_then(|m| m.total_pages) {
                Some(total) if page < total => page += 1,
                _ => break,
            }
        }

        Ok(children)
    }

    /// 是否已完成子集合预取
    pub fn is_prefetched(&self, child_model: &str) -> bool {
        self.prefetched.contains(child_model)
    }

    /// 预取整个子集合并按父记录写入缓存
    ///
    /// 每个周期最多执行一次；水位线落在跳过窗口内时不执行
    pub async fn prefetch_children(
        &mut self,
        child_model: &str,
        parent_key: &str,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(), SyncError> {
        if self.prefetched.contains(child_model) {
            return Ok(());
        }

        if let Some(updated_at) = self.source_updated_at {
            if updated_at >= Utc::now() - self.prefetch_skip_window {
                debug!(
                    "Skipping {} prefetch; last sync {} is within the skip window",
                    child_model, updated_at
                );
                return Ok(());
            }
        }

        info!("Prefetching {} collection", child_model);
        let page_size = self.prefetch_page_size;
        let mut feed = QueryParams::new();
        feed.insert(format!("{}_not_null", parent_key), "true".to_string());
        feed.insert("per_page".to_string(), page_size.to_string());

        let mut cursor = PageCursor::new(child_model, feed, None, None);
        let mut fetched: u64 = 0;
        let mut rows = Vec::new();
        while let Some(page) = self.next_page(&mut cursor).await? {
            fetched += page.rows.len() as u64;
            let event = ProgressEvent {
                model: child_model.to_string(),
                page: page.number,
                records_processed: fetched,
                rows_on_page: page.rows.len() as u64,
                meta: Some(stage_meta(page.meta, "fetch")),
            };
            rows.extend(page.rows);
            observer.on_progress(&event).await?;
        }

        let mut by_parent: BTreeMap<i64, Vec<Value>> = BTreeMap::new();
        for row in rows {
            let parent_id = row.get(parent_key).and_then(Value::as_i64);
            if let (Some(parent_id), true) = (parent_id, row.is_object()) {
                by_parent.entry(parent_id).or_default().push(row);
            }
        }
        observer
            .on_progress(&ProgressEvent {
                model: child_model.to_string(),
                page: cursor.total_pages().unwrap_or(0),
                records_processed: fetched,
                rows_on_page: 0,
                meta: Some(stage_meta(None, "normalize_done")),
            })
            .await?;

        let parents = by_parent.len();
        for (parent_id, children) in by_parent {
            for child in &children {
                if let (Some(id), Value::Object(object)) = (child.get("id").and_then(Value::as_i64), child) {
                    self.seed_object(child_model, id, object.clone());
                }
            }

            let total_entries = children.len() as u64;
            let chunks: Vec<Vec<Value>> = children
                .chunks(page_size as usize)
                .map(<[Value]>::to_vec)
                .collect();
            let total_pages = chunks.len() as u32;
            for (index, chunk) in chunks.into_iter().enumerate() {
                let params = child_params(parent_key, parent_id, index as u32 + 1);
                self.seed_list(
                    child_model,
                    &params,
                    chunk,
                    PageMeta::seeded(total_pages, total_entries),
                );
            }
        }
        observer
            .on_progress(&ProgressEvent {
                model: child_model.to_string(),
                page: cursor.total_pages().unwrap_or(0),
                records_processed: fetched,
                rows_on_page: 0,
                meta: Some(stage_meta(None, "cache").with("parents", Value::from(parents as u64))),
            })
            .await?;

        self.prefetched.insert(child_model.to_string());
        info!(
            "Prefetched {} {} rows for {} parents",
            fetched, child_model, parents
        );
        Ok(())
    }
}

fn child_params(parent_key: &str, parent_id: i64, page: u32) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert(parent_key.to_string(), parent_id.to_string());
    if page > 1 {
        params.insert("page".to_string(), page.to_string());
    }
    params
}

fn stage_meta(meta: Option<PageMeta>, stage: &str) -> PageMeta {
    meta.unwrap_or_default().with("stage", Value::from(stage))
}
