//! API Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tecra_core::CoreError;
use tecra_elysium::ElysiumError;
use tecra_tnode::{TnodeConfigError, TnodeError};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("Invalid parameter: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Tnode(#[from] TnodeError),

    #[error(transparent)]
    TnodeConfig(#[from] TnodeConfigError),

    #[error(transparent)]
    Elysium(#[from] ElysiumError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// JSON-RPC error code
    pub fn code(&self) -> i64 {
        match self {
            ApiError::InvalidAddress(_) | ApiError::BlockNotFound(_) => -5,
            ApiError::InsufficientFunds { .. } => -6,
            ApiError::InvalidParams(_) => -8,
            ApiError::MethodNotFound(_) => -32601,
            ApiError::Core(_) => -25,
            ApiError::Elysium(ElysiumError::PropertyNotFound(_)) => -8,
            ApiError::Tnode(_) | ApiError::TnodeConfig(_) | ApiError::Elysium(_) => -1,
            ApiError::Internal(_) => -32603,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "result": null,
            "error": self.to_json(),
            "id": null,
        }));

        (self.status(), body).into_response()
    }
}
