// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use repairshopr_sync::engines::api_client::VendorClient;
use repairshopr_sync::engines::fetcher::ResilientFetcher;
use repairshopr_sync::engines::pager::{NoopObserver, PageCursor};
use repairshopr_sync::engines::request_window::RequestWindow;
use repairshopr_sync::engines::reqwest_engine::ReqwestTransport;
use repairshopr_sync::engines::traits::{FetchError, QueryParams};
use repairshopr_sync::utils::retry_policy::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{line_item, vendor_client, FakeVendor};

fn client_for(server: &MockServer, max_attempts: u32) -> VendorClient {
    let transport = ReqwestTransport::new("test-token", Duration::from_secs(5)).unwrap();
    let fetcher = ResilientFetcher::new(
        Arc::new(transport),
        RequestWindow::new(1000, Duration::from_secs(60)),
        RetryPolicy::immediate(max_attempts),
    );
    VendorClient::new(fetcher, format!("{}/api/v1", server.uri()))
}

fn page_params(page: u32) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("page".to_string(), page.to_string());
    params
}

#[tokio::test]
async fn test_identical_list_request_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/invoices"))
        .and(header("authorization", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "invoices": [{"id": 1}, {"id": 2}],
            "meta": {"total_pages": 1, "total_entries": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server, 3);
    let (first, meta) = client.fetch_list("invoice", &page_params(1)).await.unwrap();
    let (second, _) = client.fetch_list("invoice", &page_params(1)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(meta.unwrap().total_entries, Some(2));
    assert_eq!(client.stats().calls("invoices_bulk"), 1);
}

#[tokio::test]
async fn test_cleared_cache_requests_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = client_for(&server, 3);
    client.fetch_list("user", &page_params(1)).await.unwrap();
    client.clear_cache();
    client.fetch_list("user", &page_params(1)).await.unwrap();
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [{"id": 5}],
            "meta": {"total_pages": 1}
        })))
        .mount(&server)
        .await;

    let mut client = client_for(&server, 3);
    let (rows, _) = client.fetch_list("product", &page_params(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/customers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server, 5);
    let err = client.fetch_list("customer", &page_params(1)).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tickets"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let mut client = client_for(&server, 3);
    let err = client.fetch_list("ticket", &page_params(1)).await.unwrap_err();
    assert!(matches!(err, FetchError::RetryableTransport { status: Some(502), .. }));
}

#[tokio::test]
async fn test_object_fetch_accepts_compact_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/line_items/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lineitem": {"id": 42, "name": "Screen"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server, 1);
    let object = client.fetch_by_id("line_item", 42).await.unwrap();
    assert_eq!(object["name"], "Screen");
    // Second lookup hits the object cache.
    client.fetch_by_id("line_item", 42).await.unwrap();
}

#[tokio::test]
async fn test_tail_window_requests_first_then_last_pages() {
    let server = MockServer::start().await;
    for page in [1u32, 9, 10] {
        Mock::given(method("GET"))
            .and(path("/api/v1/customers"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "customers": [{"id": page}],
                "meta": {"total_pages": 10, "total_entries": 10}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut client = client_for(&server, 1);
    let mut cursor = PageCursor::new("customer", QueryParams::new(), None, Some(2));
    let rows = client.fetch_all(&mut cursor).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(cursor.requested_pages(), &[1, 9, 10]);
}

#[tokio::test]
async fn test_prefetched_children_are_served_without_requests() {
    let vendor = FakeVendor::new(vec![], vec![line_item(10, 1), line_item(11, 1), line_item(12, 2)]);
    let mut client = vendor_client(vendor.clone());
    client.begin_cycle(None);

    client
        .prefetch_children("line_item", "invoice_id", &mut NoopObserver)
        .await
        .unwrap();
    assert!(client.is_prefetched("line_item"));
    let requests_after_prefetch = vendor.request_count();

    let seeded = client.fetch_children("line_item", "invoice_id", 1).await.unwrap();
    assert_eq!(seeded.len(), 2);
    let absent = client.fetch_children("line_item", "invoice_id", 99).await.unwrap();
    assert!(absent.is_empty());

    assert_eq!(vendor.request_count(), requests_after_prefetch);
}

#[tokio::test]
async fn test_malformed_ticket_settings_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tickets/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .mount(&server)
        .await;

    let mut client = client_for(&server, 1);
    let err = client.fetch_ticket_settings().await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedPayload(_)));
    assert!(err.to_string().contains("ticket settings"));
}
