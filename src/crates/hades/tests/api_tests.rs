//! HTTP API tests, driven through the router without a socket

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::setup_harness;
use hades::api::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "hades-api");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_track_complete_rollback_flow() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());
    harness.runtime.set("web", true);

    let (status, body) = send(
        &app,
        post_json(
            "/api/track",
            json!({"command": "docker stop web", "operation_type": "docker_stop", "correlation_id": "req-9"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["operation_id"].as_str().unwrap().to_string();
    harness.runtime.set("web", false);

    let (status, body) = send(
        &app,
        post_json("/api/complete", json!({"operation_id": id, "success": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "recorded"}));

    let (status, body) = send(&app, get(&format!("/api/operations/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correlation_id"], "req-9");
    assert_eq!(body["before_state"]["kind"], "container");
    assert_eq!(body["before_state"]["running"], true);
    assert_eq!(body["rollback_hint"], "docker start web");

    let (status, body) = send(&app, post_json("/api/rollback", json!({"operation_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation_id"], id.as_str());
    assert_eq!(body["success"], true);
    assert_eq!(body["action"], "started_back_up");

    let (_, body) = send(&app, post_json("/api/rollback", json!({"operation_id": id}))).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["action"], "already_rolled_back");
}

#[tokio::test]
async fn test_rollback_by_count_returns_list() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());
    harness.runtime.set("a", false);
    harness.runtime.set("b", false);

    for name in ["a", "b"] {
        harness
            .engine
            .track(&format!("docker stop {}", name), "docker_stop", None)
            .await
            .unwrap();
    }

    let (status, body) = send(&app, post_json("/api/rollback", json!({"count": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    let reports = body.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r["action"] == "no_op_already_correct_state"));

    // Default count is one; nothing is left to roll back
    let (_, body) = send(&app, post_json("/api/rollback", json!({}))).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_operations() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());

    for i in 0..3 {
        harness
            .engine
            .track(&format!("docker stop svc{}", i), "docker_stop", None)
            .await
            .unwrap();
    }

    let (status, body) = send(&app, get("/api/operations?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["command"], "docker stop svc2");
    assert_eq!(list[0]["state"], "tracked");

    let (status, body) = send(&app, get("/api/operations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_error_responses() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());

    let (status, body) = send(&app, get("/api/operations/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["error"], "NotFound");

    let (status, body) = send(&app, get("/api/operations?limit=0")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        post_json("/api/track", json!({"command": "", "operation_type": "file_write"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, post_json("/api/rollback", json!({"operation_id": "ghost"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "not_found");
}

#[tokio::test]
async fn test_malformed_bodies_get_error_json() {
    let harness = setup_harness().await;
    let app = create_router(harness.engine.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/track")
        .header("content-type", "application/json")
        .body(Body::from("{\"command\": "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "JSON_ERROR");
    assert_eq!(body["error"], "JsonError");

    let (status, body) = send(&app, post_json("/api/complete", json!({"success": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "JSON_ERROR");

    let (status, body) = send(&app, get("/api/operations?limit=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
