// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use repairshopr_sync::config::settings::ParityPolicy;
use repairshopr_sync::domain::services::heartbeat::HeartbeatPolicy;
use repairshopr_sync::engines::api_client::VendorClient;
use repairshopr_sync::engines::fetcher::ResilientFetcher;
use repairshopr_sync::engines::request_window::RequestWindow;
use repairshopr_sync::engines::traits::{ApiRequest, ApiResponse, EngineError, HttpTransport};
use repairshopr_sync::utils::retry_policy::RetryPolicy;
use repairshopr_sync::workers::sync_orchestrator::OrchestratorConfig;
use sea_orm::{Database, DatabaseConnection};
use serde_json::{json, Map, Value};

pub const BASE_URL: &str = "https://acme.test/api/v1";

/// 内存数据库并执行迁移
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory sqlite");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    Arc::new(db)
}

/// 按内存数据回答列表请求的厂商接口
///
/// 支持 `page`、`per_page`、按字段过滤和 `*_not_null` 过滤
pub struct FakeVendor {
    pub invoices: Mutex<Vec<Value>>,
    pub line_items: Mutex<Vec<Value>>,
    /// 覆盖聚合查询报告的 total_entries
    pub reported_line_item_total: Mutex<Option<u64>>,
    /// 工单设置响应体，`None` 时返回 503
    pub ticket_settings: Mutex<Option<Value>>,
    pub per_page: usize,
    pub requests: Mutex<Vec<ApiRequest>>,
}

impl FakeVendor {
    pub fn new(invoices: Vec<Value>, line_items: Vec<Value>) -> Arc<Self> {
        Self::with_page_size(invoices, line_items, 25)
    }

    pub fn with_page_size(invoices: Vec<Value>, line_items: Vec<Value>, per_page: usize) -> Arc<Self> {
        Arc::new(Self {
            invoices: Mutex::new(invoices),
            line_items: Mutex::new(line_items),
            reported_line_item_total: Mutex::new(None),
            ticket_settings: Mutex::new(Some(json!({}))),
            per_page,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, collection: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(&format!("/{}", collection)))
            .cloned()
            .collect()
    }

    fn rows_for(&self, collection: &str) -> Vec<Value> {
        match collection {
            "invoices" => self.invoices.lock().unwrap().clone(),
            "line_items" => self.line_items.lock().unwrap().clone(),
            _ => Vec::new(),
        }
    }
}

fn matches_filters(row: &Value, request: &ApiRequest) -> bool {
    request.params.iter().all(|(key, expected)| {
        if matches!(key.as_str(), "page" | "per_page" | "sort" | "since_updated_at") {
            return true;
        }
        if let Some(field) = key.strip_suffix("_not_null") {
            return row.get(field).is_some_and(|v| !v.is_null());
        }
        match row.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(other) => other.to_string() == *expected,
            None => false,
        }
    })
}

#[async_trait]
impl HttpTransport for FakeVendor {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, EngineError> {
        self.requests.lock().unwrap().push(request.clone());

        if request.url.ends_with("/tickets/settings") {
            return Ok(match self.ticket_settings.lock().unwrap().clone() {
                Some(body) => ApiResponse {
                    status: 200,
                    body: body.to_string(),
                    content_type: "application/json".to_string(),
                },
                None => ApiResponse {
                    status: 503,
                    body: "service unavailable".to_string(),
                    content_type: "text/plain".to_string(),
                },
            });
        }

        let collection = request.url.rsplit('/').next().unwrap_or_default().to_string();
        let rows: Vec<Value> = self
            .rows_for(&collection)
            .into_iter()
            .filter(|row| matches_filters(row, request))
            .collect();

        let per_page = request
            .params
            .get("per_page")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.per_page);
        let page: usize = request
            .params
            .get("page")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let total_pages = rows.len().div_ceil(per_page).max(1);
        let slice: Vec<Value> = rows
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        let mut total_entries = rows.len() as u64;
        if collection == "line_items" && request.params.contains_key("invoice_id_not_null") {
            if let Some(reported) = *self.reported_line_item_total.lock().unwrap() {
                total_entries = reported;
            }
        }

        let mut body = Map::new();
        body.insert(collection, Value::Array(slice));
        body.insert(
            "meta".to_string(),
            json!({
                "total_pages": total_pages,
                "total_entries": total_entries,
                "page": page,
                "per_page": per_page,
            }),
        );
        Ok(ApiResponse {
            status: 200,
            body: Value::Object(body).to_string(),
            content_type: "application/json".to_string(),
        })
    }
}

/// 使用脚本化传输的客户端，重试不等待
pub fn vendor_client(transport: Arc<dyn HttpTransport>) -> VendorClient {
    let fetcher = ResilientFetcher::new(
        transport,
        RequestWindow::new(10_000, Duration::from_secs(60)),
        RetryPolicy::immediate(3),
    );
    VendorClient::new(fetcher, BASE_URL)
}

/// 零容差的编排器配置
pub fn strict_config() -> OrchestratorConfig {
    OrchestratorConfig {
        force_full: false,
        baseline_epoch: Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
        models: None,
        parity_policy: ParityPolicy::FailFullSync,
        parity_absolute_tolerance: 0,
        parity_relative_tolerance: 0.0,
        parity_recent_samples: 5,
        parity_spread_samples: 5,
        parity_max_mismatches: 20,
        heartbeat: HeartbeatPolicy::default(),
    }
}

pub fn invoice(id: i64, updated_at: &str) -> Value {
    json!({
        "id": id,
        "number": format!("{}", 1000 + id),
        "customer_id": 7,
        "total": 120.5,
        "is_paid": false,
        "updated_at": updated_at,
    })
}

pub fn line_item(id: i64, invoice_id: i64) -> Value {
    json!({
        "id": id,
        "invoice_id": invoice_id,
        "name": format!("Part {}", id),
        "price": 40.0,
        "quantity": 1.0,
        "updated_at": "2026-01-05T09:30:00.000-05:00",
    })
}
