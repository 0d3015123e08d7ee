//! HTTP-facing integration tests for the evaluation facade, in the
//! teacher's style (see `clawft-llm`'s dev-dependency on `wiremock`):
//! exercise the router end-to-end with `tower::ServiceExt::oneshot`
//! rather than binding a real socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ark_evaluator_api::{build_router, AppState};
use ark_evaluator_core::{Config, KubeClientMode};

fn disabled_state() -> AppState {
    AppState::new(Config {
        kube_client_mode: KubeClientMode::Disabled,
        ..Config::default()
    })
}

async fn send(body: serde_json::Value, path: &str) -> (StatusCode, serde_json::Value) {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn ready_reports_ready_without_a_cluster() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn list_metrics_returns_six_descriptors() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/providers/ragas/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn list_metrics_rejects_unknown_provider() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/providers/bogus/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_metric_returns_faithfulness_descriptor() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/providers/ragas/metrics/faithfulness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["ragasName"], "faithfulness");
}

#[tokio::test]
async fn event_provider_scores_weighted_rules_over_an_empty_stream() {
    // No cluster reachable (Disabled mode) -> the event stream is empty,
    // so every rule that asserts something happened is false. This still
    // exercises the full weighted-aggregation path end to end (§8).
    let body = serde_json::json!({
        "type": "event",
        "evaluatorName": "trajectory-check",
        "config": {
            "rules": [
                {"name": "r1", "expression": "tool.was_called('search')", "weight": 2.0},
                {"name": "r2", "expression": "events.size() >= 0", "weight": 1.0}
            ]
        },
        "parameters": {"query.name": "q1", "min-score": "0.5"}
    });
    let (status, json) = send(body, "/evaluate").await;
    assert_eq!(status, StatusCode::OK);
    // r1 is false (0 events), r2 ("events.size() >= 0") is true regardless.
    // weighted = (2*0 + 1*1) / 3 = 0.333
    let score: f64 = json["score"].as_str().unwrap().parse().unwrap();
    assert!((score - 0.333).abs() < 1e-3);
    assert_eq!(json["passed"], false);
}

#[tokio::test]
async fn unknown_provider_is_rejected_with_bad_request() {
    let body = serde_json::json!({
        "type": "direct",
        "evaluatorName": "e",
        "config": {"input": "q", "output": "a"},
        "parameters": {"provider": "not-a-real-provider"}
    });
    let (status, json) = send(body, "/evaluate").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "ConfigurationError");
}

#[tokio::test]
async fn malformed_json_body_is_rejected() {
    let app = build_router(disabled_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .header("content-type", "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
