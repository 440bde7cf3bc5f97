//! Multivec API Service Library
//!
//! HTTP tile server for multivec datasets, following the HiGlass server
//! conventions (`/api/v1/tileset_info/`, `/api/v1/tiles/`).

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;

use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the service router over `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tileset API
        .route("/api/v1/tilesets", get(handlers::tilesets::list_tilesets_handler))
        .route("/api/v1/tilesets/", get(handlers::tilesets::list_tilesets_handler))
        .route(
            "/api/v1/tileset_info",
            get(handlers::tileset_info::tileset_info_handler),
        )
        .route(
            "/api/v1/tileset_info/",
            get(handlers::tileset_info::tileset_info_handler),
        )
        .route("/api/v1/tiles", get(handlers::tiles::tiles_handler))
        .route("/api/v1/tiles/", get(handlers::tiles::tiles_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
