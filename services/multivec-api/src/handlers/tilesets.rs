//! Tileset listing handler.

use axum::{extract::Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::record_request;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TilesetSummary {
    pub uuid: String,
    pub name: String,
    pub datatype: &'static str,
    pub filetype: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TilesetList {
    pub count: usize,
    pub results: Vec<TilesetSummary>,
}

/// GET /api/v1/tilesets/ - Registered tilesets
pub async fn list_tilesets_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<TilesetList> {
    let started = Instant::now();

    let results: Vec<TilesetSummary> = state
        .tilesets()
        .map(|t| TilesetSummary {
            uuid: t.uid.clone(),
            name: t.name.clone(),
            datatype: "multivec",
            filetype: "zarr-multivec",
        })
        .collect();

    record_request("tilesets", started);
    Json(TilesetList {
        count: results.len(),
        results,
    })
}
