//! Request helpers shared across integration tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

/// Send a JSON request and decode the JSON response (Null for empty bodies).
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Send a binary request body and decode the JSON response.
#[allow(dead_code)]
pub async fn binary_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: impl Into<Vec<u8>>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/octet-stream")
        .body(Body::from(body.into()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Initiate an upload session and return its id.
#[allow(dead_code)]
pub async fn create_upload(router: &axum::Router, file_name: &str, file_type: &str) -> String {
    let (status, response) = json_request(
        router,
        "POST",
        "/v1/uploads",
        Some(serde_json::json!({
            "file_name": file_name,
            "file_type": file_type,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {response}");
    response["upload_id"].as_str().unwrap().to_string()
}

/// Submit one chunk.
#[allow(dead_code)]
pub async fn put_chunk(
    router: &axum::Router,
    upload_id: &str,
    index: u32,
    total: u32,
    payload: &[u8],
) -> (StatusCode, Value) {
    binary_request(
        router,
        "PUT",
        &format!("/v1/uploads/{upload_id}/chunks/{index}?total={total}"),
        payload.to_vec(),
    )
    .await
}
