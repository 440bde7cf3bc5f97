//! HTTP request handlers for the multivec API.

pub mod health;
pub mod tileset_info;
pub mod tiles;
pub mod tilesets;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Request-level failures. Per-tileset and per-tile failures are reported
/// inside a successful response instead.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing query parameter `{0}`")]
    MissingParameter(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingParameter(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(error_value(self))).into_response()
    }
}

/// `{"error": message}`
pub fn error_value(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Values of every `d` parameter, in request order.
pub fn dataset_params(params: &[(String, String)]) -> Vec<&str> {
    params
        .iter()
        .filter(|(key, _)| key == "d")
        .map(|(_, value)| value.as_str())
        .collect()
}
