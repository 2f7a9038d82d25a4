//! Store client tests against a mock PostgREST server.
//!
//! Tests verify:
//! - Request URL, query string, and credential headers
//! - Status checks for select (200) and insert (201)
//! - Repository decoding over real HTTP responses

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use influscan_api::error::{RepositoryError, StoreError};
use influscan_api::store::{Direction, Query, RestStore, Store};
use influscan_api::ScanRepository;

fn owner_query() -> Query {
    Query::new("scans")
        .filter_eq("user_id", "user_alice")
        .order_by("created_at", Direction::Descending)
}

#[tokio::test]
async fn test_select_sends_query_and_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .and(query_param("user_id", "eq.user_alice"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .and(header("content-type", "application/json"))
        .and(header("prefer", "return=minimal"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "service-key").unwrap();
    let body = store.select(&owner_query()).await.unwrap();
    assert_eq!(body, Bytes::from_static(b"[]"));
}

#[tokio::test]
async fn test_select_encodes_filter_values() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .and(query_param("user_id", "eq.a&b=c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "key").unwrap();
    let query = Query::new("scans").filter_eq("user_id", "a&b=c");
    store.select(&query).await.unwrap();
}

#[tokio::test]
async fn test_select_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "wrong-key").unwrap();
    let err = store.select(&owner_query()).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnexpectedStatus {
            expected: 200,
            actual: 401
        }
    ));
}

#[tokio::test]
async fn test_select_transport_error() {
    // Nothing listens on the discard port.
    let store = RestStore::new("http://127.0.0.1:9", "key").unwrap();
    let err = store.select(&owner_query()).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
}

#[tokio::test]
async fn test_insert_requests_representation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scans"))
        .and(header("apikey", "service-key"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({"user_id": "user_alice", "status": "pending"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "9b2e",
            "user_id": "user_alice",
            "created_at": "2024-05-01T12:00:00+00:00",
            "status": "pending"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let repo = ScanRepository::new(RestStore::new(&server.uri(), "service-key").unwrap());
    let scan = repo.create_scan("user_alice").await.unwrap();
    assert_eq!(scan.id, "9b2e");
    assert_eq!(scan.user_id, "user_alice");
    assert_eq!(scan.status, "pending");
}

#[tokio::test]
async fn test_insert_requires_created_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scans"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "key").unwrap();
    let err = store
        .insert("scans", Bytes::from_static(b"{}"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnexpectedStatus {
            expected: 201,
            actual: 200
        }
    ));
}

#[tokio::test]
async fn test_repository_decodes_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "b", "user_id": "user_alice", "created_at": "2024-05-02T08:00:00.5+00:00", "status": "pending"},
            {"id": "a", "user_id": "user_alice", "created_at": "2024-05-01T08:00:00+00:00", "status": "completed"}
        ])))
        .mount(&server)
        .await;

    let repo = ScanRepository::new(RestStore::new(&server.uri(), "key").unwrap());
    let scans = repo.get_scans("user_alice").await.unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].id, "b");
    assert!(scans[0].created_at > scans[1].created_at);
}

#[tokio::test]
async fn test_repository_rejects_malformed_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "a", "status": "pending"}])),
        )
        .mount(&server)
        .await;

    let repo = ScanRepository::new(RestStore::new(&server.uri(), "key").unwrap());
    let err = repo.get_scans("user_alice").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Decode(_)));
}

#[tokio::test]
async fn test_repository_propagates_store_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scans"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let repo = ScanRepository::new(RestStore::new(&server.uri(), "key").unwrap());
    let err = repo.get_scans("user_alice").await.unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Query(StoreError::UnexpectedStatus { actual: 500, .. })
    ));
}
