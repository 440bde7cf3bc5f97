//! Tile handler.

use axum::{
    extract::{Extension, Query},
    Json,
};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::{dataset_params, error_value, ApiError};
use crate::metrics::{record_rejected_tile_id, record_request, record_tile};
use crate::state::{AppState, Tileset};

/// GET /api/v1/tiles/?d=uid.z.x[&d=uid.z.x...]
///
/// Ids of the same tileset are fetched as one batch. Each id maps to its
/// tile or to `{"error": ...}`; ids that are not `uid.z.x` are left out.
pub async fn tiles_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let started = Instant::now();

    let ids = dataset_params(&params);
    if ids.is_empty() {
        return Err(ApiError::MissingParameter("d"));
    }

    let mut response = Map::new();
    let mut groups: HashMap<&str, (&Tileset, Vec<&str>)> = HashMap::new();

    for id in ids {
        let Some((uid, tile)) = id.split_once('.') else {
            tracing::warn!(tile_id = %id, "Dropping tile id without a tileset uid");
            record_rejected_tile_id();
            continue;
        };

        match state.get(uid) {
            Some(tileset) => groups.entry(uid).or_insert((tileset, Vec::new())).1.push(tile),
            None => {
                record_rejected_tile_id();
                response.insert(
                    id.to_string(),
                    error_value(format!("No such tileset with uid: {}", uid)),
                );
            }
        }
    }

    let batches = join_all(groups.into_iter().map(|(uid, (tileset, tiles))| async move {
        (uid, tileset.fetcher.fetch_tiles(&tiles).await)
    }))
    .await;

    for (uid, batch) in batches {
        for (tile_id, result) in batch {
            let value = match result {
                Ok(tile) => {
                    record_tile(uid, true);
                    serde_json::to_value(&tile).unwrap_or_else(|e| error_value(e))
                }
                Err(e) => {
                    record_tile(uid, false);
                    error_value(e)
                }
            };
            response.insert(format!("{}.{}", uid, tile_id), value);
        }
    }

    record_request("tiles", started);
    Ok(Json(response))
}
