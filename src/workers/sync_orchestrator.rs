// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::settings::{ParityPolicy, SyncSettings};
use crate::domain::models::parity::{CollectionParity, ParityReport, SampleMismatch};
use crate::domain::models::record::DomainRecord;
use crate::domain::models::registry::{
    parity_families, selected_models, ChildSource, ModelDescriptor, RelatedCollection,
    TICKET_SETTINGS,
};
use crate::domain::models::sync_cycle::{SyncCycle, SyncMode};
use crate::domain::normalizer::hydrate;
use crate::domain::normalizer::hydrator::hydrate_object;
use crate::domain::repositories::checkpoint_repository::{CheckpointRepository, SYNC_CHECKPOINT};
use crate::domain::repositories::record_repository::{ParentLink, RecordRepository, StoredRecord};
use crate::domain::repositories::sync_status_repository::SyncStatusRepository;
use crate::domain::services::heartbeat::{HeartbeatPolicy, HeartbeatTracker};
use crate::domain::services::parity_service::{allowed_tolerance, evenly_spaced, sample_parents};
use crate::engines::api_client::VendorClient;
use crate::engines::pager::{PageCursor, ProgressEvent, ProgressObserver};
use crate::utils::errors::SyncError;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub force_full: bool,
    pub baseline_epoch: DateTime<Utc>,
    /// `None` 表示全部模型
    pub models: Option<Vec<String>>,
    pub parity_policy: ParityPolicy,
    pub parity_absolute_tolerance: u64,
    pub parity_relative_tolerance: f64,
    pub parity_recent_samples: u64,
    pub parity_spread_samples: u64,
    pub parity_max_mismatches: usize,
    pub heartbeat: HeartbeatPolicy,
}

impl From<&SyncSettings> for OrchestratorConfig {
    fn from(settings: &SyncSettings) -> Self {
        let models = settings.selected_models();
        Self {
            force_full: settings.force_full,
            baseline_epoch: settings.baseline_epoch,
            models: if models.is_empty() { None } else { Some(models) },
            parity_policy: settings.parity_policy,
            parity_absolute_tolerance: settings.parity_absolute_tolerance,
            parity_relative_tolerance: settings.parity_relative_tolerance,
            parity_recent_samples: settings.parity_recent_samples,
            parity_spread_samples: settings.parity_spread_samples,
            parity_max_mismatches: settings.parity_max_mismatches,
            heartbeat: HeartbeatPolicy::from(settings),
        }
    }
}

/// 选择同步模式
///
/// 只有存在不早于基线的水位线时才允许增量模式
pub fn determine_mode(
    force_full: bool,
    watermark: Option<DateTime<Utc>>,
    baseline_epoch: DateTime<Utc>,
) -> SyncMode {
    match watermark {
        Some(watermark) if !force_full && watermark >= baseline_epoch => SyncMode::Incremental,
        _ => SyncMode::Full,
    }
}

/// `HH:MM:SS`
pub fn format_hms(elapsed_seconds: i64) -> String {
    let elapsed_seconds = elapsed_seconds.max(0);
    let hours = elapsed_seconds / 3600;
    let minutes = (elapsed_seconds % 3600) / 60;
    let seconds = elapsed_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// 周期结果
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub cycle: SyncCycle,
    pub parity: ParityReport,
}

/// 周期进度，按心跳策略写入状态记录
struct CycleProgress {
    cycle: SyncCycle,
    tracker: HeartbeatTracker,
    status: Arc<dyn SyncStatusRepository>,
}

impl CycleProgress {
    async fn beat(&mut self, model: &str, page: u32, records_processed: u64) -> Result<(), SyncError> {
        let now = Instant::now();
        if !self.tracker.should_write(model, page, records_processed, now) {
            return Ok(());
        }
        self.cycle.heartbeat(model, page, records_processed, Utc::now())?;
        self.status.save(&self.cycle).await?;
        self.tracker.mark_written(model, page, records_processed, now);
        Ok(())
    }
}

#[async_trait]
impl ProgressObserver for CycleProgress {
    async fn on_progress(&mut self, event: &ProgressEvent) -> Result<(), SyncError> {
        debug!(
            model = %event.model,
            page = event.page,
            rows = event.rows_on_page,
            records = event.records_processed,
            stage = event.stage().unwrap_or("page"),
            "sync progress"
        );
        // Prefetch counts rows of the child feed, not records written in this cycle.
        let records = if event.stage().is_some() {
            self.cycle.records_processed
        } else {
            event.records_processed
        };
        self.beat(&event.model, event.page, records).await
    }
}

/// 同步编排器
///
/// 按注册表顺序逐个模型同步，周期结束后做对账，校验通过才提交水位线
pub struct SyncOrchestrator {
    client: VendorClient,
    records: Arc<dyn RecordRepository>,
    status: Arc<dyn SyncStatusRepository>,
    checkpoints: Arc<dyn CheckpointRepository>,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    pub fn new(
        client: VendorClient,
        records: Arc<dyn RecordRepository>,
        status: Arc<dyn SyncStatusRepository>,
        checkpoints: Arc<dyn CheckpointRepository>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            client,
            records,
            status,
            checkpoints,
            config,
        }
    }

    pub fn client(&self) -> &VendorClient {
        &self.client
    }

    /// 执行一个同步周期
    ///
    /// 失败时错误会写入状态记录的 `last_error` 后再返回
    ///
    /// # 返回值
    ///
    /// * `Ok(CycleSummary)` - 周期成功
    /// * `Err(SyncError)` - 周期失败
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, SyncError> {
        let started_at = Utc::now();
        info!(
            "SYNC_RUN start={}",
            started_at.to_rfc3339_opts(SecondsFormat::Micros, false)
        );

        let mut cycle = SyncCycle::new(SyncMode::Full);
        cycle.start(started_at)?;

        let watermark = match self.checkpoints.last_updated_at(SYNC_CHECKPOINT).await {
            Ok(watermark) => watermark,
            Err(e) => return Err(self.abort(cycle, e.into()).await),
        };
        let mode = determine_mode(self.config.force_full, watermark, self.config.baseline_epoch);
        info!(
            "Sync mode {} (last committed watermark: {:?})",
            mode, watermark
        );

        cycle.mode = Some(mode);
        if let Err(e) = self.status.save(&cycle).await {
            return Err(self.abort(cycle, e.into()).await);
        }

        let since = match mode {
            SyncMode::Incremental => watermark,
            SyncMode::Full => None,
        };
        self.client.begin_cycle(since);
        let mut progress = CycleProgress {
            cycle,
            tracker: HeartbeatTracker::new(self.config.heartbeat),
            status: self.status.clone(),
        };

        let result = self.execute(&mut progress, mode, since, started_at).await;
        let mut cycle = progress.cycle;
        let finished_at = Utc::now();

        let outcome = match result {
            Ok(parity) => {
                cycle.complete(finished_at)?;
                self.status.save(&cycle).await?;
                counter!("sync_cycles_total", "status" => "success").increment(1);
                Ok(CycleSummary {
                    cycle: cycle.clone(),
                    parity,
                })
            }
            Err(e) => {
                error!("Sync cycle failed: {}", e);
                cycle.fail(e.to_string(), finished_at)?;
                if let Err(save_err) = self.status.save(&cycle).await {
                    error!("Failed to persist sync failure status: {}", save_err);
                }
                counter!("sync_cycles_total", "status" => "failed").increment(1);
                Err(e)
            }
        };

        self.client.clear_cache();
        self.client.log_api_stats();

        let elapsed_seconds = (finished_at - started_at).num_seconds();
        info!(
            "SYNC_RUN done start={} end={} elapsed_seconds={} elapsed_hms={}",
            started_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            finished_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            elapsed_seconds,
            format_hms(elapsed_seconds)
        );
        outcome
    }

    /// 周期尚未进入模型同步就失败时，尽力写入失败状态
    async fn abort(&self, mut cycle: SyncCycle, error: SyncError) -> SyncError {
        error!("Sync cycle failed before syncing any model: {}", error);
        if let Err(e) = cycle.fail(error.to_string(), Utc::now()) {
            error!("{}", e);
        } else if let Err(save_err) = self.status.save(&cycle).await {
            error!("Failed to persist sync failure status: {}", save_err);
        }
        counter!("sync_cycles_total", "status" => "failed").increment(1);
        error
    }

    async fn execute(
        &mut self,
        progress: &mut CycleProgress,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
        started_at: DateTime<Utc>,
    ) -> Result<ParityReport, SyncError> {
        let models = selected_models(self.config.models.as_deref());
        if models.is_empty() {
            return Err(SyncError::Configuration(
                "sync.models does not name any known model".to_string(),
            ));
        }

        for model in &models {
            self.sync_model(model, mode, since, progress).await?;
        }
        if models.iter().any(|model| model.name == "ticket") {
            self.sync_ticket_settings().await?;
        }

        self.client.clear_cache();
        let report = self.validate(&models).await?;
        if report.has_violations() {
            let summary = report.summary();
            let fatal = mode == SyncMode::Full && self.config.parity_policy == ParityPolicy::FailFullSync;
            if fatal {
                error!("Parity check failed for full sync: {}", summary);
                return Err(SyncError::ParityViolation(summary));
            }
            warn!("Parity check found violations (mode={}): {}", mode, summary);
        } else {
            info!(
                "Parity check passed ({} collections, {} sampled parents)",
                report.collections.len(),
                report.sampled_parents
            );
        }

        let cycle_id = progress.cycle.cycle_id.clone();
        self.checkpoints
            .commit(SYNC_CHECKPOINT, started_at, cycle_id.as_deref())
            .await?;
        info!("Committed sync watermark {}", started_at.to_rfc3339());
        Ok(report)
    }

    async fn sync_model(
        &mut self,
        model: &'static ModelDescriptor,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
        progress: &mut CycleProgress,
    ) -> Result<(), SyncError> {
        let tail_window = match mode {
            SyncMode::Incremental => model.num_last_pages,
            SyncMode::Full => None,
        };
        info!(
            "Syncing {} (mode={}, tail_window={:?})",
            model.name, mode, tail_window
        );

        for related in model.related {
            if let ChildSource::ByParent {
                parent_key,
                prefetch: true,
            } = related.source
            {
                self.client
                    .prefetch_children(related.child_model(), parent_key, progress)
                    .await?;
            }
        }

        let mut cursor = PageCursor::new(model.name, model.query_params(), since, tail_window);
        let mut model_records: u64 = 0;
        while let Some(page) = self.client.next_page(&mut cursor).await? {
            for row in &page.rows {
                let record = hydrate(model.shape, row)?;
                if record.id.is_none() {
                    warn!("Skipping {} row without id on page {}", model.name, page.number);
                    continue;
                }
                self.store(model, &record).await?;
                model_records += 1;
                counter!("sync_records_processed_total", "model" => model.name).increment(1);
            }

            let records_processed = progress.cycle.records_processed + page.rows.len() as u64;
            progress
                .on_progress(&ProgressEvent {
                    model: model.name.to_string(),
                    page: page.number,
                    records_processed,
                    rows_on_page: page.rows.len() as u64,
                    meta: page.meta,
                })
                .await?;
            // Keep the running total even when the heartbeat write was throttled.
            progress.cycle.records_processed = records_processed;
        }

        info!(
            "Successfully imported {} {} records ({} pages)",
            model_records,
            model.name,
            cursor.requested_pages().len()
        );
        Ok(())
    }

    /// 同步工单类型、字段和字段答案
    ///
    /// 接口失败只记录警告，不影响周期结果；写库失败仍然致命
    async fn sync_ticket_settings(&mut self) -> Result<(), SyncError> {
        let settings = match self.client.fetch_ticket_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to fetch ticket settings: {}", e);
                return Ok(());
            }
        };

        for &(key, shape) in TICKET_SETTINGS.iter() {
            let Some(rows) = settings.get(key).and_then(|v| v.as_array()) else {
                debug!("Ticket settings carry no {}", key);
                continue;
            };
            let mut stored = 0u64;
            for row in rows.iter().filter_map(|row| row.as_object()) {
                let record = hydrate_object(shape, row);
                match StoredRecord::from_record(&record, None, &[]) {
                    Some(record) => {
                        self.records.upsert(&record).await?;
                        stored += 1;
                    }
                    None => warn!("Skipping {} without id", shape.name),
                }
            }
            info!("Successfully imported {} {} records", stored, shape.name);
        }
        Ok(())
    }

    /// 写入父记录和全部子集合
    async fn store(&mut self, model: &'static ModelDescriptor, record: &DomainRecord) -> Result<(), SyncError> {
        let embedded: Vec<&str> = model
            .related
            .iter()
            .filter_map(|related| match related.source {
                ChildSource::Embedded { field } => Some(field),
                ChildSource::ByParent { .. } => None,
            })
            .collect();

        let Some(parent) = StoredRecord::from_record(record, None, &embedded) else {
            return Ok(());
        };
        self.records.upsert(&parent).await?;

        for related in model.related {
            let Some(children) = self.children_of(related, record, parent.record_id).await? else {
                continue;
            };
            let link = ParentLink {
                parent_model: model.name.to_string(),
                parent_id: parent.record_id,
                collection: related.name.to_string(),
            };
            self.replace_children(related, &link, &children).await?;
        }
        Ok(())
    }

    /// 子记录；嵌入字段缺失或未解析时返回 `None`，不改动已有链接
    async fn children_of(
        &mut self,
        related: &RelatedCollection,
        record: &DomainRecord,
        parent_id: i64,
    ) -> Result<Option<Vec<DomainRecord>>, SyncError> {
        match related.source {
            ChildSource::Embedded { field } => {
                if record.has_records(field) {
                    Ok(Some(record.records(field).to_vec()))
                } else {
                    Ok(None)
                }
            }
            ChildSource::ByParent { parent_key, .. } => {
                let rows = self
                    .client
                    .fetch_children(related.child_model(), parent_key, parent_id)
                    .await?;
                Ok(Some(
                    rows.iter()
                        .map(|row| hydrate_object(related.shape, row))
                        .collect(),
                ))
            }
        }
    }

    async fn replace_children(
        &self,
        related: &RelatedCollection,
        link: &ParentLink,
        children: &[DomainRecord],
    ) -> Result<(), SyncError> {
        let mut keep = Vec::with_capacity(children.len());
        for child in children {
            match StoredRecord::from_record(child, Some(link.clone()), &[]) {
                Some(stored) => {
                    self.records.upsert(&stored).await?;
                    keep.push(stored.record_id);
                }
                None => warn!(
                    "Skipping {} child of {} {} without id",
                    related.child_model(),
                    link.parent_model,
                    link.parent_id
                ),
            }
        }

        let unlinked = self
            .records
            .unlink_missing_children(related.child_model(), link, &keep)
            .await?;
        if unlinked > 0 {
            debug!(
                "Unlinked {} stale {} from {} {}",
                unlinked, related.name, link.parent_model, link.parent_id
            );
        }
        Ok(())
    }

    /// 对账
    ///
    /// 聚合数量用容差带比较，抽样父记录的子数量要求完全一致
    async fn validate(&mut self, models: &[&'static ModelDescriptor]) -> Result<ParityReport, SyncError> {
        let mut report = ParityReport::default();

        for family in parity_families(models) {
            let child = family.child_model();
            let (_, meta) = self
                .client
                .fetch_list(child, &family.aggregate_params())
                .await?;

            match meta.and_then(|m| m.total_entries) {
                Some(expected) => {
                    let actual = self.records.count(child).await?;
                    let allowed = allowed_tolerance(
                        expected,
                        self.config.parity_absolute_tolerance,
                        self.config.parity_relative_tolerance,
                    );
                    let parity = CollectionParity::new(child, expected, actual, allowed);
                    info!(
                        "Parity {}: expected={} actual={} delta={} allowed={}",
                        child, parity.expected, parity.actual, parity.delta, parity.allowed
                    );
                    report.collections.push(parity);
                }
                None => warn!("Vendor did not report total_entries for {}; skipping aggregate parity", child),
            }

            let recent = self
                .records
                .recent_ids(family.parent_model, self.config.parity_recent_samples)
                .await?;
            let all_ids = self.records.all_ids(family.parent_model).await?;
            let spread = evenly_spaced(&all_ids, self.config.parity_spread_samples as usize);

            for parent_id in sample_parents(&recent, &spread) {
                let expected = self
                    .client
                    .fetch_children(child, family.parent_key, parent_id)
                    .await?
                    .len() as u64;
                let actual = self
                    .records
                    .count_children(child, family.parent_model, parent_id)
                    .await?;
                report.sampled_parents += 1;
                if expected != actual {
                    warn!(
                        "Parity sample mismatch {} {}: vendor={} local={}",
                        family.parent_model, parent_id, expected, actual
                    );
                    report.push_mismatch(
                        SampleMismatch {
                            collection: child.to_string(),
                            parent_id,
                            expected,
                            actual,
                        },
                        self.config.parity_max_mismatches,
                    );
                }
            }
        }

        Ok(report)
    }
}
