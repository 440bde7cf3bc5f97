//! Tileset info handler.

use axum::{
    extract::{Extension, Query},
    Json,
};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use super::{dataset_params, error_value, ApiError};
use crate::metrics::record_request;
use crate::state::AppState;

/// GET /api/v1/tileset_info/?d=uid[&d=uid...]
///
/// Maps each uid to its tileset info, or to `{"error": ...}` when the uid is
/// unknown or its metadata cannot be resolved.
pub async fn tileset_info_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let started = Instant::now();

    let uids = dataset_params(&params);
    if uids.is_empty() {
        return Err(ApiError::MissingParameter("d"));
    }

    let state = &state;
    let entries = join_all(uids.into_iter().map(|uid| async move {
        let value = match state.get(uid) {
            Some(tileset) => {
                let report = tileset.fetcher.get_tileset_info().await;
                serde_json::to_value(&report).unwrap_or_else(|e| error_value(e))
            }
            None => error_value(format!("No such tileset with uid: {}", uid)),
        };
        (uid.to_string(), value)
    }))
    .await;

    record_request("tileset_info", started);
    Ok(Json(entries.into_iter().collect()))
}
