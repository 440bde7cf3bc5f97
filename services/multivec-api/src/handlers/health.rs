//! Health and metrics handlers.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use multivec_tiles::FetcherState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Metadata state of each tileset.
    pub tilesets: BTreeMap<String, &'static str>,
}

fn state_label(state: &FetcherState) -> &'static str {
    match state {
        FetcherState::Idle => "idle",
        FetcherState::ResolvingMetadata => "resolving",
        FetcherState::Ready => "ready",
        FetcherState::MetadataFailed(_) => "metadata_failed",
    }
}

/// GET /health - Basic health check
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    let mut tilesets = BTreeMap::new();
    for tileset in state.tilesets() {
        let label = state_label(&tileset.fetcher.state().await);
        tilesets.insert(tileset.uid.clone(), label);
    }

    Json(HealthResponse {
        status: "ok".to_string(),
        tilesets,
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
