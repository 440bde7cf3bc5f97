//! Prometheus metrics recorded by the handlers.
//!
//! Without an installed recorder the macros are no-ops, so handlers can
//! record unconditionally.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count one served tile, labelled by tileset and outcome.
pub fn record_tile(tileset: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("multivec_tiles_total", "tileset" => tileset.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Count a tile id that named no registered tileset or was malformed.
pub fn record_rejected_tile_id() {
    counter!("multivec_rejected_tile_ids_total").increment(1);
}

/// Record one request to `endpoint` that started at `started`.
pub fn record_request(endpoint: &'static str, started: Instant) {
    counter!("multivec_requests_total", "endpoint" => endpoint).increment(1);
    histogram!("multivec_request_duration_ms", "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64() * 1000.0);
}
