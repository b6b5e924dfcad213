// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{TimeZone, Utc};
use repairshopr_sync::domain::models::status_report::StatusReport;
use repairshopr_sync::domain::models::sync_cycle::{CycleStatus, SyncCycle, SyncMode};
use repairshopr_sync::domain::repositories::checkpoint_repository::{
    CheckpointRepository, SYNC_CHECKPOINT,
};
use repairshopr_sync::domain::repositories::record_repository::{
    ParentLink, RecordRepository, StoredRecord,
};
use repairshopr_sync::domain::repositories::sync_status_repository::SyncStatusRepository;
use repairshopr_sync::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::sync_status_repo_impl::SyncStatusRepositoryImpl;
use repairshopr_sync::application::use_cases::flush_use_case::{FlushSummary, FlushUseCase};
use serde_json::json;
use std::sync::Arc;

use super::helpers::setup_db;

fn stored(model: &str, id: i64, parent: Option<ParentLink>, day: u32) -> StoredRecord {
    StoredRecord {
        model: model.to_string(),
        record_id: id,
        parent,
        payload: json!({"id": id}),
        source_updated_at: Some(Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()),
    }
}

fn invoice_link(parent_id: i64) -> ParentLink {
    ParentLink {
        parent_model: "invoice".to_string(),
        parent_id,
        collection: "line_items".to_string(),
    }
}

#[tokio::test]
async fn test_upsert_is_idempotent_per_model_and_id() {
    let repo = RecordRepositoryImpl::new(setup_db().await);

    repo.upsert(&stored("invoice", 1, None, 1)).await.unwrap();
    let mut changed = stored("invoice", 1, None, 2);
    changed.payload = json!({"id": 1, "total": 9.5});
    repo.upsert(&changed).await.unwrap();
    // Same id under another model is a separate record.
    repo.upsert(&stored("payment", 1, None, 1)).await.unwrap();

    assert_eq!(repo.count("invoice").await.unwrap(), 1);
    assert_eq!(repo.count("payment").await.unwrap(), 1);
}

#[tokio::test]
async fn test_top_level_upsert_keeps_parent_link() {
    let repo = RecordRepositoryImpl::new(setup_db().await);

    repo.upsert(&stored("line_item", 10, Some(invoice_link(1)), 1)).await.unwrap();
    repo.upsert(&stored("line_item", 10, None, 2)).await.unwrap();

    assert_eq!(repo.count_children("line_item", "invoice", 1).await.unwrap(), 1);
    assert_eq!(repo.count_unlinked("line_item").await.unwrap(), 0);
}

#[tokio::test]
async fn test_unlink_missing_children_keeps_listed_ids() {
    let repo = RecordRepositoryImpl::new(setup_db().await);
    for id in [10, 11, 12] {
        repo.upsert(&stored("line_item", id, Some(invoice_link(1)), 1)).await.unwrap();
    }
    repo.upsert(&stored("line_item", 20, Some(invoice_link(2)), 1)).await.unwrap();

    let unlinked = repo
        .unlink_missing_children("line_item", &invoice_link(1), &[10])
        .await
        .unwrap();

    assert_eq!(unlinked, 2);
    assert_eq!(repo.count_children("line_item", "invoice", 1).await.unwrap(), 1);
    assert_eq!(repo.count_children("line_item", "invoice", 2).await.unwrap(), 1);
    assert_eq!(repo.count_unlinked("line_item").await.unwrap(), 2);
    assert_eq!(repo.count("line_item").await.unwrap(), 4);

    // An empty keep list unlinks every child of the parent.
    let unlinked = repo
        .unlink_missing_children("line_item", &invoice_link(2), &[])
        .await
        .unwrap();
    assert_eq!(unlinked, 1);
}

#[tokio::test]
async fn test_id_queries() {
    let repo = RecordRepositoryImpl::new(setup_db().await);
    for (id, day) in [(1, 3), (2, 1), (3, 2)] {
        repo.upsert(&stored("invoice", id, None, day)).await.unwrap();
    }

    assert_eq!(repo.recent_ids("invoice", 2).await.unwrap(), vec![1, 3]);
    assert_eq!(repo.all_ids("invoice").await.unwrap(), vec![1, 2, 3]);

    let existing = repo.existing_ids("invoice", &[2, 3, 99]).await.unwrap();
    assert_eq!(existing.len(), 2);
    assert!(existing.contains(&2) && existing.contains(&3));
    assert!(repo.existing_ids("invoice", &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_round_trip() {
    let repo = SyncStatusRepositoryImpl::new(setup_db().await);
    assert!(repo.load().await.unwrap().is_none());

    let started = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    let mut cycle = SyncCycle::new(SyncMode::Incremental);
    cycle.start(started).unwrap();
    cycle
        .heartbeat("invoice", 4, 400, started + chrono::Duration::seconds(30))
        .unwrap();
    repo.save(&cycle).await.unwrap();

    let loaded = repo.load().await.unwrap().unwrap();
    assert_eq!(loaded.cycle_id, cycle.cycle_id);
    assert_eq!(loaded.status, CycleStatus::Running);
    assert_eq!(loaded.mode, Some(SyncMode::Incremental));
    assert_eq!(loaded.current_model.as_deref(), Some("invoice"));
    assert_eq!(loaded.current_page, Some(4));
    assert_eq!(loaded.records_processed, 400);
    assert_eq!(loaded.last_heartbeat, Some(started + chrono::Duration::seconds(30)));

    cycle.fail("boom".to_string(), started + chrono::Duration::minutes(5)).unwrap();
    repo.save(&cycle).await.unwrap();
    let loaded = repo.load().await.unwrap().unwrap();
    assert_eq!(loaded.status, CycleStatus::Failed);
    assert_eq!(loaded.last_error.as_deref(), Some("boom"));

    let report = StatusReport::build(Some(&loaded), started + chrono::Duration::minutes(10), 600);
    assert_eq!(report.status, "failed");
    assert!(!report.is_stale);
}

#[tokio::test]
async fn test_checkpoint_commit_overwrites() {
    let repo = CheckpointRepositoryImpl::new(setup_db().await);
    assert!(repo.last_updated_at(SYNC_CHECKPOINT).await.unwrap().is_none());

    let first = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
    repo.commit(SYNC_CHECKPOINT, first, Some("a")).await.unwrap();
    repo.commit(SYNC_CHECKPOINT, second, None).await.unwrap();

    assert_eq!(repo.last_updated_at(SYNC_CHECKPOINT).await.unwrap(), Some(second));
    assert!(repo.last_updated_at("other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_flush_wipes_records_and_watermark() {
    let db = setup_db().await;
    let records = Arc::new(RecordRepositoryImpl::new(db.clone()));
    let checkpoints = Arc::new(CheckpointRepositoryImpl::new(db));

    records.upsert(&stored("invoice", 1, None, 1)).await.unwrap();
    records
        .upsert(&stored("line_item", 10, Some(invoice_link(1)), 1))
        .await
        .unwrap();
    let watermark = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    checkpoints.commit(SYNC_CHECKPOINT, watermark, None).await.unwrap();

    let flush = FlushUseCase::new(records.clone(), checkpoints.clone());
    let summary = flush.run().await.unwrap();

    assert_eq!(
        summary,
        FlushSummary {
            records_deleted: 2,
            checkpoint_cleared: true,
        }
    );
    assert_eq!(records.count("invoice").await.unwrap(), 0);
    assert_eq!(records.count("line_item").await.unwrap(), 0);
    assert!(checkpoints.last_updated_at(SYNC_CHECKPOINT).await.unwrap().is_none());

    // Flushing an empty store is harmless.
    let summary = flush.run().await.unwrap();
    assert_eq!(summary.records_deleted, 0);
    assert!(!summary.checkpoint_cleared);
}
