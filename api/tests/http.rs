use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tecra_api::{app, ApiState};
use tecra_core::ConsensusParams;
use tower::ServiceExt;

async fn post(router: axum::Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_rpc_over_http() {
    let state = ApiState::for_params(ConsensusParams::regtest());
    let router = app(state.clone());

    let (status, body) = post(router.clone(), json!({ "method": "generate", "params": [3], "id": 7 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 7);
    assert_eq!(body["error"], Value::Null);
    assert_eq!(body["result"].as_array().map(Vec::len), Some(3));

    let (_, body) = post(router, json!({ "method": "getblockcount", "id": "a" })).await;
    assert_eq!(body["result"], 3);
    assert_eq!(state.node.read().await.height(), 3);
}

#[tokio::test]
async fn test_rpc_errors_carry_codes() {
    let router = app(ApiState::for_params(ConsensusParams::regtest()));

    let (status, body) = post(router.clone(), json!({ "method": "nosuchmethod", "params": [], "id": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["result"], Value::Null);

    let (status, body) = post(
        router,
        json!({ "method": "elysium_getbalance", "params": ["TCR1x", 9], "id": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Property identifier does not exist"));
}

#[tokio::test]
async fn test_health() {
    let router = app(ApiState::for_params(ConsensusParams::regtest()));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["network"], "regtest");
    assert_eq!(body["blocks"], 0);
}
