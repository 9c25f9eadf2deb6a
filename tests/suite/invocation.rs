//! Delivering results for a fetched invocation

use std::any::type_name;

use runloop_engine::{Body, Failure, SendError, StatusError};
use runloop_types::protocol::ERROR_TYPE_HEADER;
use serde_json::json;

use crate::common::{
    error_path, failure_body, fetch, header, mount_error_ack, mount_next_invocation,
    mount_response_ack, requests_to, response_path, runtime_for, start_runtime_mock,
};

#[tokio::test]
async fn only_the_first_response_is_sent() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 202, 1).await;
    mount_error_ack(&server, "abc123", 202, 0).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;

    invocation.respond_string("first").await.unwrap();
    assert!(invocation.is_completed());
    assert!(matches!(
        invocation.respond_string("second").await,
        Err(SendError::AlreadyCompleted)
    ));
    assert!(matches!(
        invocation.fail("Oops", None).await,
        Err(SendError::AlreadyCompleted)
    ));

    let sent = requests_to(&server, &response_path("abc123")).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, b"first");
}

#[tokio::test]
async fn respond_without_body_sends_empty_payload() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    invocation.respond(None).await.unwrap();

    let sent = requests_to(&server, &response_path("abc123")).await;
    assert!(sent[0].body.is_empty());
}

#[tokio::test]
async fn buffered_body_is_sent_verbatim() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    invocation
        .respond(Some(Body::from(&b"raw bytes"[..])))
        .await
        .unwrap();

    let sent = requests_to(&server, &response_path("abc123")).await;
    assert_eq!(sent[0].body, b"raw bytes");
    assert_eq!(header(&sent[0], "content-length"), Some("9"));
}

#[tokio::test]
async fn rejected_acknowledgement_still_completes() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 500, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;

    let err = invocation.respond_string("ok").await.unwrap_err();
    assert!(matches!(err, SendError::Rejected(StatusError::Server(500))));
    assert!(invocation.is_completed());
    assert!(matches!(
        invocation.respond_string("retry").await,
        Err(SendError::AlreadyCompleted)
    ));
}

#[tokio::test]
async fn client_rejection_is_classified() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 413, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;

    let err = invocation.fail("Oops", None).await.unwrap_err();
    assert!(matches!(err, SendError::Rejected(StatusError::Client(413))));
}

#[tokio::test]
async fn fail_sends_type_header_and_json_detail() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 202, 1).await;
    mount_response_ack(&server, "abc123", 202, 0).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    let detail = Failure::new("bad input", "Validation");
    invocation.fail("Validation", Some(&detail)).await.unwrap();

    let sent = requests_to(&server, &error_path("abc123")).await;
    assert_eq!(header(&sent[0], ERROR_TYPE_HEADER), Some("Validation"));
    assert_eq!(
        failure_body(&sent[0]),
        json!({"errorMessage": "bad input", "errorType": "Validation", "stackTrace": []})
    );
}

#[tokio::test]
async fn fail_with_empty_type_omits_header() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    invocation.fail("", None).await.unwrap();

    let sent = requests_to(&server, &error_path("abc123")).await;
    assert_eq!(header(&sent[0], ERROR_TYPE_HEADER), None);
    assert!(sent[0].body.is_empty());
}

#[tokio::test]
async fn fail_with_error_tags_the_error_type() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    let err = std::io::Error::other("disk full");
    invocation
        .fail_with_error("cannot save", &err)
        .await
        .unwrap();

    let sent = requests_to(&server, &error_path("abc123")).await;
    let expected_type = type_name::<std::io::Error>();
    assert_eq!(header(&sent[0], ERROR_TYPE_HEADER), Some(expected_type));
    let body = failure_body(&sent[0]);
    assert_eq!(body["errorMessage"], "cannot save: disk full");
    assert_eq!(body["errorType"], expected_type);
}

#[tokio::test]
async fn respond_json_serializes_value() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", r#"{"name":"ada"}"#).await;
    mount_response_ack(&server, "abc123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    let input: serde_json::Value = invocation.body_json().unwrap();
    invocation
        .respond_json(&json!({"greeting": format!("hello {}", input["name"].as_str().unwrap())}))
        .await
        .unwrap();

    let sent = requests_to(&server, &response_path("abc123")).await;
    let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
    assert_eq!(body, json!({"greeting": "hello ada"}));
}

#[tokio::test]
async fn request_id_is_percent_encoded_in_path() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc/123", "{}").await;
    mount_response_ack(&server, "abc%2F123", 202, 1).await;

    let runtime = runtime_for(&server);
    let mut invocation = fetch(&runtime).await;
    invocation.respond(None).await.unwrap();
}
