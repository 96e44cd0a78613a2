//! Minimal JSON-RPC client used by `tecra-cli`

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("error code {code}: {message}")]
    Rpc { code: i64, message: String },
}

pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let response: Value = self
            .http
            .post(&self.url)
            .json(&json!({ "method": method, "params": params, "id": 1 }))
            .send()
            .await?
            .json()
            .await?;
        into_result(response)
    }
}

fn into_result(mut response: Value) -> Result<Value, ClientError> {
    match response.get("error") {
        Some(error) if !error.is_null() => Err(ClientError::Rpc {
            code: error["code"].as_i64().unwrap_or(-1),
            message: error["message"].as_str().unwrap_or_default().to_string(),
        }),
        _ => Ok(response["result"].take()),
    }
}

/// Command-line argument as a JSON parameter: JSON if it parses, else a string
pub fn parse_param(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}
