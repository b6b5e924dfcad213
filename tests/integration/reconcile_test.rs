// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use repairshopr_sync::application::use_cases::reconcile_use_case::{
    ReconcileEvent, ReconcileOptions, ReconcileUseCase,
};
use repairshopr_sync::domain::models::registry::{parity_families, selected_models, ParityFamily};
use repairshopr_sync::domain::repositories::record_repository::{
    ParentLink, RecordRepository, StoredRecord,
};
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use serde_json::json;

use super::helpers::{invoice, line_item, setup_db, vendor_client, FakeVendor};

fn line_item_family() -> ParityFamily {
    parity_families(&selected_models(None))
        .into_iter()
        .find(|f| f.child_model() == "line_item")
        .unwrap()
}

fn local(model: &str, id: i64, parent: Option<i64>) -> StoredRecord {
    StoredRecord {
        model: model.to_string(),
        record_id: id,
        parent: parent.map(|parent_id| ParentLink {
            parent_model: "invoice".to_string(),
            parent_id,
            collection: "line_items".to_string(),
        }),
        payload: json!({"id": id}),
        source_updated_at: None,
    }
}

/// 厂商有 6 行明细，本地只有 10 和一个无父记录的 50
async fn fixture() -> (Arc<FakeVendor>, Arc<RecordRepositoryImpl>) {
    let vendor = FakeVendor::with_page_size(
        vec![],
        vec![
            line_item(10, 1),
            line_item(11, 1),
            line_item(12, 2),
            line_item(13, 99),
            json!({"id": 14, "invoice_id": "n/a"}),
            json!({"id": "x1", "invoice_id": 1}),
        ],
        2,
    );

    let records = Arc::new(RecordRepositoryImpl::new(setup_db().await));
    records.upsert(&local("invoice", 1, None)).await.unwrap();
    records.upsert(&local("invoice", 2, None)).await.unwrap();
    records.upsert(&local("line_item", 10, Some(1))).await.unwrap();
    records.upsert(&local("line_item", 50, None)).await.unwrap();
    (vendor, records)
}

async fn run(vendor: Arc<FakeVendor>, records: Arc<RecordRepositoryImpl>, options: ReconcileOptions) -> Vec<ReconcileEvent> {
    let mut use_case = ReconcileUseCase::new(vendor_client(vendor), records, line_item_family(), options);
    let mut events = Vec::new();
    use_case.run(&mut |event| events.push(event.clone())).await.unwrap();
    events
}

#[tokio::test]
async fn test_forensic_scan_counts_gaps() {
    let (vendor, records) = fixture().await;
    let options = ReconcileOptions {
        progress_every: 2,
        compute_db_not_in_api: true,
        ..ReconcileOptions::default()
    };

    let events = run(vendor, records, options).await;

    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], ReconcileEvent::ScanProgress { page: 2, final_page: 3, .. }));
    assert!(matches!(
        events[1],
        ReconcileEvent::ScanProgress {
            page: 3,
            api_rows_scanned: 5,
            missing_unique_ids_so_far: 4,
            ..
        }
    ));

    let ReconcileEvent::ForensicSummary {
        page_end,
        api_reported_total_entries,
        api_unique_ids,
        api_duplicate_rows,
        api_non_int_id_rows,
        api_non_int_parent_id_rows,
        db_total_rows,
        gap_vs_api_reported_total,
        api_unique_not_in_db,
        ref missing_examples,
        missing_parent_ids_count,
        missing_parent_ids_without_parent_row,
        db_null_parent_id_count,
        db_not_in_api_unique,
        ..
    } = events[2]
    else {
        panic!("expected forensic summary, got {:?}", events[2]);
    };
    assert_eq!(page_end, 3);
    assert_eq!(api_reported_total_entries, Some(6));
    assert_eq!(api_unique_ids, 5);
    assert_eq!(api_duplicate_rows, 0);
    assert_eq!(api_non_int_id_rows, 1);
    assert_eq!(api_non_int_parent_id_rows, 1);
    assert_eq!(db_total_rows, 2);
    assert_eq!(gap_vs_api_reported_total, Some(4));
    assert_eq!(api_unique_not_in_db, 4);
    assert_eq!(missing_examples, &vec![11, 12, 13, 14]);
    assert_eq!(missing_parent_ids_count, 3);
    assert_eq!(missing_parent_ids_without_parent_row, 1);
    assert_eq!(db_null_parent_id_count, 1);
    assert_eq!(db_not_in_api_unique, Some(1));
}

#[tokio::test]
async fn test_apply_repairs_existing_parents() {
    let (vendor, records) = fixture().await;
    let options = ReconcileOptions {
        apply: true,
        ..ReconcileOptions::default()
    };

    let events = run(vendor, records.clone(), options).await;

    assert_eq!(
        events[events.len() - 2],
        ReconcileEvent::RepairProgress {
            parent_progress: 2,
            parent_total: 2,
            rows_upserted: 3,
        }
    );
    assert_eq!(
        events[events.len() - 1],
        ReconcileEvent::RepairSummary {
            parent_repairs_attempted: 2,
            rows_upserted: 3,
            remaining_missing_from_scanned_set: 2,
        }
    );
    assert_eq!(records.count_children("line_item", "invoice", 1).await.unwrap(), 2);
    assert_eq!(records.count_children("line_item", "invoice", 2).await.unwrap(), 1);
}

#[tokio::test]
async fn test_repair_cap_limits_parents() {
    let (vendor, records) = fixture().await;
    let options = ReconcileOptions {
        apply: true,
        max_repair_parents: 1,
        ..ReconcileOptions::default()
    };

    let events = run(vendor.clone(), records.clone(), options).await;

    assert_eq!(
        events.last(),
        Some(&ReconcileEvent::RepairSummary {
            parent_repairs_attempted: 1,
            rows_upserted: 2,
            remaining_missing_from_scanned_set: 3,
        })
    );
    assert!(vendor
        .requests_to("line_items")
        .iter()
        .all(|r| r.params.get("invoice_id").map(String::as_str) != Some("2")));
}

#[tokio::test]
async fn test_page_range_limits_scan() {
    let (vendor, records) = fixture().await;
    let options = ReconcileOptions {
        page_start: 2,
        page_end: 2,
        ..ReconcileOptions::default()
    };

    let events = run(vendor, records, options).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[1],
        ReconcileEvent::ForensicSummary {
            page_start: 2,
            page_end: 2,
            api_rows_scanned: 2,
            api_unique_not_in_db: 2,
            db_not_in_api_unique: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_scan_does_not_retain_pages() {
    let (vendor, records) = fixture().await;
    let mut use_case = ReconcileUseCase::new(
        vendor_client(vendor.clone()),
        records,
        line_item_family(),
        ReconcileOptions::default(),
    );

    let scan = use_case.scan(&mut |_| {}).await.unwrap();

    assert_eq!(scan.api_rows_scanned, 5);
    assert_eq!(use_case.client().cache_len(), 0);
    // The first page is fetched once for its meta and reused by the scan.
    assert_eq!(vendor.requests_to("line_items").len(), 3);
}
