mod common;

use crate::common::TestAppBuilder;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use text_retrieval_backend_core::MockBackend;

#[tokio::test]
async fn test_embed() {
    let app = TestAppBuilder::new().build();

    let (status, body) = app
        .post_json("/embed", json!({"texts": ["hello", "world!"], "mode": "query"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dim"], 4);
    assert_eq!(
        body["vectors"],
        json!([[12.0, 12.0, 1.0, 1.0], [13.0, 13.0, 1.0, 1.0]])
    );
    assert_eq!(
        app.embed_calls.inputs(),
        vec!["query: hello".to_string(), "query: world!".to_string()]
    );
}

#[tokio::test]
async fn test_embed_default_mode_is_passage() {
    let app = TestAppBuilder::new().build();

    let (status, _) = app.post_json("/embed", json!({"texts": ["doc"]})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_json("/embed", json!({"texts": ["doc"], "mode": "document"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.embed_calls.inputs(),
        vec!["passage: doc".to_string(), "passage: doc".to_string()]
    );
}

#[tokio::test]
async fn test_embed_batches() {
    let app = TestAppBuilder::new().build();
    let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();

    let (status, body) = app.post_json("/embed", json!({ "texts": texts })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vectors"].as_array().unwrap().len(), 5);
    assert_eq!(app.embed_calls.batch_sizes(), vec![2, 2, 1]);
}

#[tokio::test]
async fn test_embed_empty() {
    let app = TestAppBuilder::new().build();

    let (status, body) = app.post_json("/embed", json!({"texts": []})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"vectors": [], "dim": 0}));
    assert_eq!(app.embed_calls.count(), 0);
}

#[tokio::test]
async fn test_embed_malformed_body() {
    let app = TestAppBuilder::new().build();

    for body in [
        r#"{"texts": "not a list"}"#,
        r#"{"mode": "query"}"#,
        r#"{"texts": [1, 2]}"#,
        r#"{"texts": ["#,
    ] {
        let (status, response) = app.post_raw("/embed", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");
        assert_eq!(response["error_type"], "validation");
        assert!(response["error"]
            .as_str()
            .unwrap()
            .starts_with("Input validation error: "));
    }

    assert_eq!(app.embed_calls.count(), 0);
}

#[tokio::test]
async fn test_embed_missing_content_type() {
    let app = TestAppBuilder::new().build();

    let request = Request::builder()
        .method("POST")
        .uri("/embed")
        .body(Body::from(r#"{"texts": ["a"]}"#))
        .unwrap();
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.embed_calls.count(), 0);
}

#[tokio::test]
async fn test_embed_payload_limit() {
    let app = TestAppBuilder::new().payload_limit(64).build();
    let texts = vec!["a".repeat(128)];

    let (status, _) = app.post_json("/embed", json!({ "texts": texts })).await;

    assert!(status.is_client_error());
    assert_eq!(app.embed_calls.count(), 0);
}

#[tokio::test]
async fn test_embed_backend_error() {
    let app = TestAppBuilder::new()
        .embed(MockBackend::new(4).failing_on_call(1))
        .build();

    let (status, body) = app.post_json("/embed", json!({"texts": ["a"]})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "backend");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("mock inference failure"));
}

#[tokio::test]
async fn test_embed_overloaded() {
    let app = TestAppBuilder::new().max_concurrent_requests(0).build();

    let (status, body) = app.post_json("/embed", json!({"texts": ["a"]})).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error_type"], "overloaded");
    assert_eq!(app.embed_calls.count(), 0);
}
