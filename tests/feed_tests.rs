//! Allocation feed client against a mock registry.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slurp::error::SlurpError;
use slurp::feed::{AllocationSource, FeedClient};

async fn registry_returning(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/allocations"))
        .and(query_param("format", "json"))
        .respond_with(template)
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn client(server: &MockServer) -> FeedClient {
    FeedClient::new(
        format!("{}/allocations", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_converts_registry_records() {
    let body = json!([
        {
            "allocation_id": 17,
            "amount": 50000.4,
            "start_date": "2026-01-01",
            "end_date": "2026-12-31T23:59:59Z",
            "project": {
                "project_id": "ucb42",
                "collaborators": "[u'alice', u'bob']",
                "qos_addenda": "gpu, gpu,long"
            }
        },
        {
            "amount": "12",
            "start_date": "2026-02-01",
            "end_date": "2026-03-01",
            "parent": "condo",
            "project": {
                "project_id": "lab-7",
                "collaborators": ["carol"],
                "deactivated": true
            }
        }
    ]);
    let server = registry_returning(ResponseTemplate::new(200).set_body_json(body)).await;

    let batch = client(&server).fetch().await.unwrap();
    assert!(batch.rejected.is_empty());
    assert_eq!(batch.allocations.len(), 2);

    let first = &batch.allocations[0];
    assert_eq!(first.allocation_id, "17");
    assert_eq!(first.project_id, "ucb42");
    assert_eq!(first.amount, 50000);
    assert_eq!(
        first.collaborators.iter().collect::<Vec<_>>(),
        vec!["alice", "bob"]
    );
    assert_eq!(first.qos_addenda, vec!["gpu", "long"]);
    assert_eq!(first.end_date.to_string(), "2026-12-31");
    assert!(first.parent.is_none());
    assert!(!first.deactivated);

    let second = &batch.allocations[1];
    assert_eq!(second.allocation_id, "lab-7");
    assert_eq!(second.parent.as_deref(), Some("condo"));
    assert_eq!(second.amount, 12);
    assert!(second.deactivated);
}

#[tokio::test]
async fn test_fetch_rejects_bad_records_individually() {
    let body = json!([
        {
            "amount": 1,
            "start_date": "2026-01-01",
            "end_date": "2026-12-31",
            "project": {"project_id": "ucb1"}
        },
        {
            "allocation_id": "a-2",
            "amount": 1,
            "start_date": "2026-12-31",
            "end_date": "2026-01-01",
            "project": {"project_id": "ucb2"}
        },
        {
            "allocation_id": "a-3",
            "amount": -4,
            "start_date": "2026-01-01",
            "end_date": "2026-12-31",
            "project": {"project_id": "ucb3"}
        },
        {"unexpected": true}
    ]);
    let server = registry_returning(ResponseTemplate::new(200).set_body_json(body)).await;

    let batch = client(&server).fetch().await.unwrap();
    assert_eq!(batch.allocations.len(), 1);
    assert_eq!(batch.rejected.len(), 3);

    let ids: Vec<&str> = batch
        .rejected
        .iter()
        .map(|e| match e {
            SlurpError::MalformedAllocation { allocation, .. } => allocation.as_str(),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec!["a-2", "a-3", "#3"]);
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = registry_returning(ResponseTemplate::new(500)).await;
    let err = client(&server).fetch().await.unwrap_err();
    assert!(matches!(err, SlurpError::FeedUnavailable(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_non_array_body_is_malformed() {
    let server = registry_returning(
        ResponseTemplate::new(200).set_body_json(json!({"detail": "Authentication required"})),
    )
    .await;
    let err = client(&server).fetch().await.unwrap_err();
    assert!(matches!(err, SlurpError::FeedMalformed(_)));
}

#[tokio::test]
async fn test_slow_registry_times_out() {
    let server = registry_returning(
        ResponseTemplate::new(200)
            .set_body_json(json!([]))
            .set_delay(Duration::from_secs(2)),
    )
    .await;
    let client = FeedClient::new(
        format!("{}/allocations", server.uri()),
        Duration::from_millis(200),
    )
    .unwrap();

    assert!(matches!(
        client.fetch().await,
        Err(SlurpError::FeedUnavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_registry_is_unavailable() {
    let client = FeedClient::new("http://127.0.0.1:9/allocations", Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.fetch().await,
        Err(SlurpError::FeedUnavailable(_))
    ));
}
