// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::settings::ReconcileSettings;
use crate::domain::models::registry::ParityFamily;
use crate::domain::normalizer::hydrator::{coerce_integer, hydrate_object};
use crate::domain::repositories::record_repository::{ParentLink, RecordRepository, StoredRecord};
use crate::engines::api_client::VendorClient;
use crate::engines::traits::QueryParams;
use crate::utils::errors::SyncError;

/// 保留的缺失 id 示例数量
pub const MISSING_EXAMPLES: usize = 25;

/// 修复进度输出间隔（父记录数）
pub const REPAIR_PROGRESS_EVERY: usize = 100;

/// 对账选项
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub apply: bool,
    pub page_start: u32,
    /// 0 表示直到最后一页
    pub page_end: u32,
    pub progress_every: u32,
    /// 0 表示不限制
    pub max_repair_parents: usize,
    pub compute_db_not_in_api: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            apply: false,
            page_start: 1,
            page_end: 0,
            progress_every: 250,
            max_repair_parents: 0,
            compute_db_not_in_api: false,
        }
    }
}

impl From<&ReconcileSettings> for ReconcileOptions {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            apply: settings.apply,
            page_start: settings.page_start.max(1),
            page_end: settings.page_end,
            progress_every: settings.progress_every,
            max_repair_parents: settings.max_repair_parents,
            compute_db_not_in_api: settings.compute_db_not_in_api,
        }
    }
}

/// 对账输出事件，每个事件一行 JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReconcileEvent {
    ScanProgress {
        page: u32,
        final_page: u32,
        api_rows_scanned: u64,
        api_unique_ids: u64,
        duplicate_rows: u64,
        missing_unique_ids_so_far: u64,
    },
    ForensicSummary {
        page_start: u32,
        page_end: u32,
        api_reported_total_entries: Option<u64>,
        api_rows_scanned: u64,
        api_unique_ids: u64,
        api_duplicate_rows: u64,
        api_non_int_id_rows: u64,
        api_non_int_parent_id_rows: u64,
        db_total_rows: u64,
        gap_vs_api_reported_total: Option<i64>,
        api_unique_not_in_db: u64,
        missing_examples: Vec<i64>,
        missing_parent_ids_count: u64,
        missing_parent_ids_without_parent_row: u64,
        db_null_parent_id_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        db_not_in_api_unique: Option<u64>,
    },
    RepairProgress {
        parent_progress: usize,
        parent_total: usize,
        rows_upserted: u64,
    },
    RepairSummary {
        parent_repairs_attempted: usize,
        rows_upserted: u64,
        remaining_missing_from_scanned_set: u64,
    },
}

impl ReconcileEvent {
    /// 键按字母排序的单行 JSON
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        Ok(serde_json::to_value(self)?.to_string())
    }
}

/// 扫描结果
#[derive(Debug, Default)]
pub struct ForensicScan {
    pub page_start: u32,
    pub page_end: u32,
    pub api_reported_total_entries: Option<u64>,
    pub api_rows_scanned: u64,
    pub api_duplicate_rows: u64,
    pub api_non_int_id_rows: u64,
    pub api_non_int_parent_id_rows: u64,
    pub seen_ids: HashSet<i64>,
    pub missing_ids: HashSet<i64>,
    pub missing_parent_ids: BTreeSet<i64>,
    pub missing_examples: Vec<i64>,
}

/// 子集合对账
///
/// 扫描厂商的扁平子集合，找出本地缺失的记录，并可按父记录重新同步
pub struct ReconcileUseCase {
    client: VendorClient,
    records: Arc<dyn RecordRepository>,
    family: ParityFamily,
    options: ReconcileOptions,
}

impl ReconcileUseCase {
    pub fn new(
        client: VendorClient,
        records: Arc<dyn RecordRepository>,
        family: ParityFamily,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            client,
            records,
            family,
            options,
        }
    }

    pub fn client(&self) -> &VendorClient {
        &self.client
    }

    /// 执行扫描，按选项执行修复
    ///
    /// # 参数
    ///
    /// * `emit` - 接收每个输出事件
    pub async fn run(&mut self, emit: &mut dyn FnMut(&ReconcileEvent)) -> Result<(), SyncError> {
        let scan = self.scan(emit).await?;
        let child = self.family.child_model();

        let missing_parents: Vec<i64> = scan.missing_parent_ids.iter().copied().collect();
        let existing_parents = self
            .records
            .existing_ids(self.family.parent_model, &missing_parents)
            .await?;
        let without_parent_row = missing_parents
            .iter()
            .filter(|id| !existing_parents.contains(id))
            .count() as u64;

        let db_total_rows = self.records.count(child).await?;
        let db_not_in_api_unique = if self.options.compute_db_not_in_api {
            let db_ids = self.records.all_ids(child).await?;
            Some(db_ids.iter().filter(|id| !scan.seen_ids.contains(id)).count() as u64)
        } else {
            None
        };

        emit(&ReconcileEvent::ForensicSummary {
            page_start: scan.page_start,
            page_end: scan.page_end,
            api_reported_total_entries: scan.api_reported_total_entries,
            api_rows_scanned: scan.api_rows_scanned,
            api_unique_ids: scan.seen_ids.len() as u64,
            api_duplicate_rows: scan.api_duplicate_rows,
            api_non_int_id_rows: scan.api_non_int_id_rows,
            api_non_int_parent_id_rows: scan.api_non_int_parent_id_rows,
            db_total_rows,
            gap_vs_api_reported_total: scan
                .api_reported_total_entries
                .map(|total| total as i64 - db_total_rows as i64),
            api_unique_not_in_db: scan.missing_ids.len() as u64,
            missing_examples: scan.missing_examples.clone(),
            missing_parent_ids_count: missing_parents.len() as u64,
            missing_parent_ids_without_parent_row: without_parent_row,
            db_null_parent_id_count: self.records.count_unlinked(child).await?,
            db_not_in_api_unique,
        });

        if !self.options.apply {
            return Ok(());
        }

        let mut repair_ids: Vec<i64> = existing_parents.into_iter().collect();
        repair_ids.sort_unstable();
        if self.options.max_repair_parents > 0 {
            repair_ids.truncate(self.options.max_repair_parents);
        }

        let total = repair_ids.len();
        let mut rows_upserted: u64 = 0;
        for (index, parent_id) in repair_ids.iter().enumerate() {
            rows_upserted += self.repair_parent(*parent_id).await?;
            let progress = index + 1;
            if progress % REPAIR_PROGRESS_EVERY == 0 || progress == total {
                emit(&ReconcileEvent::RepairProgress {
                    parent_progress: progress,
                    parent_total: total,
                    rows_upserted,
                });
            }
        }

        let scanned: Vec<i64> = scan.missing_ids.iter().copied().collect();
        let recovered = self.records.existing_ids(child, &scanned).await?;
        let remaining = scanned.iter().filter(|id| !recovered.contains(id)).count() as u64;
        info!(
            "Repaired {} {} parents; {} rows upserted, {} still missing",
            total, self.family.parent_model, rows_upserted, remaining
        );

        emit(&ReconcileEvent::RepairSummary {
            parent_repairs_attempted: total,
            rows_upserted,
            remaining_missing_from_scanned_set: remaining,
        });
        Ok(())
    }

    /// 扫描扁平子集合
    pub async fn scan(&mut self, emit: &mut dyn FnMut(&ReconcileEvent)) -> Result<ForensicScan, SyncError> {
        let child = self.family.child_model();
        let page_start = self.options.page_start.max(1);

        let (_, meta) = self.client.fetch_list(child, &self.page_params(1)).await?;
        let total_pages = meta.as_ref().and_then(|m| m.total_pages).unwrap_or(page_start);
        let final_page = match self.options.page_end {
            0 => total_pages,
            end => end.min(total_pages),
        };

        let mut scan = ForensicScan {
            page_start,
            page_end: final_page,
            api_reported_total_entries: meta.and_then(|m| m.total_entries),
            ..Default::default()
        };

        for page in page_start..=final_page {
            let (rows, _) = self.client.fetch_list(child, &self.page_params(page)).await?;
            self.scan_page(&mut scan, &rows).await?;
            // Scanned pages are never read again.
            self.client.clear_cache();

            let every = self.options.progress_every.max(1);
            if page == final_page || page % every == 0 {
                emit(&ReconcileEvent::ScanProgress {
                    page,
                    final_page,
                    api_rows_scanned: scan.api_rows_scanned,
                    api_unique_ids: scan.seen_ids.len() as u64,
                    duplicate_rows: scan.api_duplicate_rows,
                    missing_unique_ids_so_far: scan.missing_ids.len() as u64,
                });
            }
        }

        Ok(scan)
    }

    async fn scan_page(&self, scan: &mut ForensicScan, rows: &[Value]) -> Result<(), SyncError> {
        let mut page_ids = Vec::with_capacity(rows.len());
        let mut parents = Vec::with_capacity(rows.len());

        for row in rows {
            let Value::Object(object) = row else {
                continue;
            };
            let Some(id) = object.get("id").and_then(coerce_integer) else {
                scan.api_non_int_id_rows += 1;
                continue;
            };

            scan.api_rows_scanned += 1;
            if !scan.seen_ids.insert(id) {
                scan.api_duplicate_rows += 1;
            }
            page_ids.push(id);

            let parent_id = object.get(self.family.parent_key).and_then(coerce_integer);
            if parent_id.is_none() {
                scan.api_non_int_parent_id_rows += 1;
            }
            parents.push(parent_id);
        }

        if page_ids.is_empty() {
            return Ok(());
        }

        let existing = self
            .records
            .existing_ids(self.family.child_model(), &page_ids)
            .await?;
        for (id, parent_id) in page_ids.into_iter().zip(parents) {
            if existing.contains(&id) || !scan.missing_ids.insert(id) {
                continue;
            }
            if scan.missing_examples.len() < MISSING_EXAMPLES {
                scan.missing_examples.push(id);
            }
            if let Some(parent_id) = parent_id {
                scan.missing_parent_ids.insert(parent_id);
            }
        }
        Ok(())
    }

    /// 重新同步一个父记录的子集合
    ///
    /// # 返回值
    ///
    /// 写入的行数
    async fn repair_parent(&mut self, parent_id: i64) -> Result<u64, SyncError> {
        let collection = self.family.collection;
        let rows = self
            .client
            .fetch_children(collection.child_model(), self.family.parent_key, parent_id)
            .await?;

        let link = ParentLink {
            parent_model: self.family.parent_model.to_string(),
            parent_id,
            collection: collection.name.to_string(),
        };

        let mut upserted = 0;
        for row in &rows {
            let record = hydrate_object(collection.shape, row);
            match StoredRecord::from_record(&record, Some(link.clone()), &[]) {
                Some(stored) => {
                    self.records.upsert(&stored).await?;
                    upserted += 1;
                }
                None => warn!(
                    "Skipping {} row without id for {} {}",
                    collection.child_model(),
                    self.family.parent_model,
                    parent_id
                ),
            }
        }
        Ok(upserted)
    }

    fn page_params(&self, page: u32) -> QueryParams {
        let mut params = self.family.aggregate_params();
        params.insert("page".to_string(), page.to_string());
        params
    }
}
