//! Tecra node API
//!
//! In-process node (chain, wallet, tnodes, Elysium) behind a JSON-RPC
//! endpoint served with axum.

mod error;
pub mod node;
mod routes;
pub mod rpc;
mod state;
pub mod wallet;

pub use error::{ApiError, ApiResult};
pub use node::{IssuanceRequest, Node, UnspentOutput};
pub use rpc::{dispatch, RpcRequest, RpcResponse};
pub use state::ApiState;
pub use wallet::Wallet;

use axum::http::{header::CONTENT_TYPE, Method};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router with CORS and request tracing, ready to serve
pub fn app(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    routes::create_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(addr: SocketAddr, state: ApiState) -> Result<(), Box<dyn std::error::Error>> {
    let app = app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("RPC server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
