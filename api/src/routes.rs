//! HTTP routes
//!
//! - `POST /` - JSON-RPC (`{"method", "params", "id"}`)
//! - `GET /health` - liveness and chain tip

use crate::rpc::{self, RpcRequest, RpcResponse};
use crate::ApiState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

pub fn create_routes() -> Router<ApiState> {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/health", get(health_check))
}

async fn handle_rpc(State(state): State<ApiState>, Json(request): Json<RpcRequest>) -> (StatusCode, Json<RpcResponse>) {
    tracing::debug!(method = %request.method, "rpc call");

    let result = {
        let mut node = state.node.write().await;
        rpc::dispatch(&mut node, &request.method, &request.params)
    };

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(method = %request.method, error = %e, "rpc call failed");
            e.status()
        }
    };
    (status, Json(RpcResponse::from_result(result, request.id)))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    network: String,
    blocks: u64,
    uptime_secs: u64,
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let blocks = state.node.read().await.height();
    Json(HealthResponse {
        status: "ok".to_string(),
        network: state.network.to_string(),
        blocks,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
