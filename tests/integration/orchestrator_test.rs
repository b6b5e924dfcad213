// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use repairshopr_sync::domain::models::sync_cycle::{CycleStatus, SyncMode};
use repairshopr_sync::domain::repositories::checkpoint_repository::{
    CheckpointRepository, SYNC_CHECKPOINT,
};
use repairshopr_sync::domain::repositories::record_repository::RecordRepository;
use repairshopr_sync::domain::repositories::sync_status_repository::SyncStatusRepository;
use repairshopr_sync::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::sync_status_repo_impl::SyncStatusRepositoryImpl;
use repairshopr_sync::utils::errors::{RepositoryError, SyncError};
use repairshopr_sync::workers::sync_orchestrator::{OrchestratorConfig, SyncOrchestrator};
use sea_orm::DatabaseConnection;
use serde_json::json;

use super::helpers::{invoice, line_item, setup_db, strict_config, vendor_client, FakeVendor};

struct Harness {
    records: Arc<RecordRepositoryImpl>,
    status: Arc<SyncStatusRepositoryImpl>,
    checkpoints: Arc<CheckpointRepositoryImpl>,
}

impl Harness {
    fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            records: Arc::new(RecordRepositoryImpl::new(db.clone())),
            status: Arc::new(SyncStatusRepositoryImpl::new(db.clone())),
            checkpoints: Arc::new(CheckpointRepositoryImpl::new(db)),
        }
    }

    fn orchestrator(&self, vendor: Arc<FakeVendor>, config: OrchestratorConfig) -> SyncOrchestrator {
        SyncOrchestrator::new(
            vendor_client(vendor),
            self.records.clone(),
            self.status.clone(),
            self.checkpoints.clone(),
            config,
        )
    }
}

fn shop() -> Arc<FakeVendor> {
    FakeVendor::new(
        vec![
            invoice(1, "2026-01-01T10:00:00.000-05:00"),
            invoice(2, "2026-01-02T10:00:00.000-05:00"),
            invoice(3, "2026-01-03T10:00:00.000-05:00"),
        ],
        vec![line_item(10, 1), line_item(11, 1), line_item(12, 2)],
    )
}

#[tokio::test]
async fn test_first_cycle_runs_full_and_commits_watermark() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    let mut orchestrator = harness.orchestrator(vendor.clone(), strict_config());

    let before = Utc::now();
    let summary = orchestrator.run_cycle().await.unwrap();

    assert_eq!(summary.cycle.mode, Some(SyncMode::Full));
    assert_eq!(summary.cycle.status, CycleStatus::Success);
    assert_eq!(summary.cycle.records_processed, 3);
    assert!(!summary.parity.has_violations());
    assert_eq!(summary.parity.collections.len(), 1);
    assert_eq!(summary.parity.sampled_parents, 3);

    assert_eq!(harness.records.count("invoice").await.unwrap(), 3);
    assert_eq!(harness.records.count("line_item").await.unwrap(), 3);
    assert_eq!(harness.records.count_children("line_item", "invoice", 1).await.unwrap(), 2);
    assert_eq!(harness.records.count_children("line_item", "invoice", 3).await.unwrap(), 0);

    let stored = harness.status.load().await.unwrap().unwrap();
    assert_eq!(stored.status, CycleStatus::Success);
    assert!(stored.finished_at.is_some());
    assert!(stored.last_error.is_none());

    let watermark = harness
        .checkpoints
        .last_updated_at(SYNC_CHECKPOINT)
        .await
        .unwrap()
        .unwrap();
    assert!(watermark >= before - Duration::seconds(1));

    // Prefetch served every invoice's line items from one bulk feed.
    let child_requests = vendor.requests_to("line_items");
    assert!(child_requests
        .iter()
        .any(|r| r.params.get("per_page").map(String::as_str) == Some("100")));
}

#[tokio::test]
async fn test_full_cycle_parity_violation_fails_without_commit() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    *vendor.reported_line_item_total.lock().unwrap() = Some(50);
    let mut orchestrator = harness.orchestrator(vendor, strict_config());

    let err = orchestrator.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::ParityViolation(_)));

    let stored = harness.status.load().await.unwrap().unwrap();
    assert_eq!(stored.status, CycleStatus::Failed);
    assert!(stored
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("parity violation")));
    assert!(harness
        .checkpoints
        .last_updated_at(SYNC_CHECKPOINT)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_incremental_cycle_only_logs_parity_violation() {
    let harness = Harness::new(setup_db().await);
    let previous = Utc::now() - Duration::days(1);
    harness
        .checkpoints
        .commit(SYNC_CHECKPOINT, previous, Some("earlier"))
        .await
        .unwrap();

    let vendor = shop();
    *vendor.reported_line_item_total.lock().unwrap() = Some(50);
    let mut orchestrator = harness.orchestrator(vendor.clone(), strict_config());

    let summary = orchestrator.run_cycle().await.unwrap();
    assert_eq!(summary.cycle.mode, Some(SyncMode::Incremental));
    assert!(summary.parity.has_violations());

    let watermark = harness
        .checkpoints
        .last_updated_at(SYNC_CHECKPOINT)
        .await
        .unwrap()
        .unwrap();
    assert!(watermark > previous);

    // A recent watermark skips the bulk prefetch and queries per invoice.
    assert!(vendor
        .requests_to("line_items")
        .iter()
        .all(|r| !r.params.contains_key("per_page")));
}

#[tokio::test]
async fn test_log_only_policy_keeps_full_cycle_successful() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    *vendor.reported_line_item_total.lock().unwrap() = Some(50);
    let mut config = strict_config();
    config.parity_policy = repairshopr_sync::config::settings::ParityPolicy::LogOnly;
    let mut orchestrator = harness.orchestrator(vendor, config);

    let summary = orchestrator.run_cycle().await.unwrap();
    assert_eq!(summary.cycle.mode, Some(SyncMode::Full));
    assert_eq!(summary.cycle.status, CycleStatus::Success);
    assert!(summary.parity.has_violations());
}

#[tokio::test]
async fn test_removed_child_is_unlinked_on_next_cycle() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    let mut config = strict_config();
    config.parity_policy = repairshopr_sync::config::settings::ParityPolicy::LogOnly;

    harness
        .orchestrator(vendor.clone(), config.clone())
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(harness.records.count_children("line_item", "invoice", 1).await.unwrap(), 2);

    vendor
        .line_items
        .lock()
        .unwrap()
        .retain(|item| item["id"] != 11);
    harness
        .orchestrator(vendor, config)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(harness.records.count_children("line_item", "invoice", 1).await.unwrap(), 1);
    assert_eq!(harness.records.count_unlinked("line_item").await.unwrap(), 1);
    assert_eq!(harness.records.count("line_item").await.unwrap(), 3);
}

#[tokio::test]
async fn test_force_full_ignores_watermark() {
    let harness = Harness::new(setup_db().await);
    harness
        .checkpoints
        .commit(SYNC_CHECKPOINT, Utc::now() - Duration::hours(2), None)
        .await
        .unwrap();

    let vendor = shop();
    let mut config = strict_config();
    config.force_full = true;
    let summary = harness.orchestrator(vendor.clone(), config).run_cycle().await.unwrap();
    assert_eq!(summary.cycle.mode, Some(SyncMode::Full));
    // A forced full cycle still prefetches despite the recent watermark.
    assert!(vendor
        .requests_to("line_items")
        .iter()
        .any(|r| r.params.get("per_page").map(String::as_str) == Some("100")));
}

#[tokio::test]
async fn test_unknown_model_selection_fails_cycle() {
    let harness = Harness::new(setup_db().await);
    let mut config = strict_config();
    config.models = Some(vec!["bogus".to_string()]);

    let err = harness.orchestrator(shop(), config).run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    let stored = harness.status.load().await.unwrap().unwrap();
    assert_eq!(stored.status, CycleStatus::Failed);
}

#[tokio::test]
async fn test_ticket_settings_are_stored_after_models() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    *vendor.ticket_settings.lock().unwrap() = Some(json!({
        "ticket_types": [{"id": 1, "name": "Repair"}],
        "ticket_type_fields": [{
            "id": 2,
            "name": "Device",
            "field_type": "text",
            "ticket_type_id": 1,
            "position": 1,
            "required": true,
        }],
        "ticket_type_field_answers": [{"id": 3, "ticket_field_id": 2, "value": "Laptop"}],
    }));

    harness.orchestrator(vendor.clone(), strict_config()).run_cycle().await.unwrap();

    assert_eq!(harness.records.count("ticket_type").await.unwrap(), 1);
    assert_eq!(harness.records.count("ticket_type_field").await.unwrap(), 1);
    assert_eq!(harness.records.count("ticket_type_field_answer").await.unwrap(), 1);
    let settings_requests = vendor
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.url.ends_with("/tickets/settings"))
        .count();
    assert_eq!(settings_requests, 1);
}

#[tokio::test]
async fn test_ticket_settings_failure_does_not_fail_cycle() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    *vendor.ticket_settings.lock().unwrap() = None;

    let summary = harness.orchestrator(vendor, strict_config()).run_cycle().await.unwrap();

    assert_eq!(summary.cycle.status, CycleStatus::Success);
    assert_eq!(harness.records.count("ticket_type").await.unwrap(), 0);
    assert!(harness
        .checkpoints
        .last_updated_at(SYNC_CHECKPOINT)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_ticket_settings_skipped_without_ticket_model() {
    let harness = Harness::new(setup_db().await);
    let vendor = shop();
    let mut config = strict_config();
    config.models = Some(vec!["invoice".to_string()]);

    harness.orchestrator(vendor.clone(), config).run_cycle().await.unwrap();

    assert!(vendor
        .requests
        .lock()
        .unwrap()
        .iter()
        .all(|r| !r.url.ends_with("/tickets/settings")));
}

struct UnreachableCheckpoints;

#[async_trait]
impl CheckpointRepository for UnreachableCheckpoints {
    async fn last_updated_at(&self, _name: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Err(RepositoryError::InvalidData("checkpoint table unavailable".to_string()))
    }

    async fn commit(
        &self,
        _name: &str,
        _updated_at: DateTime<Utc>,
        _cycle_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn clear(&self, _name: &str) -> Result<bool, RepositoryError> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_watermark_read_failure_is_persisted() {
    let harness = Harness::new(setup_db().await);
    let mut orchestrator = SyncOrchestrator::new(
        vendor_client(shop()),
        harness.records.clone(),
        harness.status.clone(),
        Arc::new(UnreachableCheckpoints),
        strict_config(),
    );

    let err = orchestrator.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Repository(_)));

    let stored = harness.status.load().await.unwrap().unwrap();
    assert_eq!(stored.status, CycleStatus::Failed);
    assert!(stored.finished_at.is_some());
    assert!(stored
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("checkpoint table unavailable")));
    assert_eq!(harness.records.count("invoice").await.unwrap(), 0);
}
