//! Batch fetching against an in-memory backend.
//!
//! Chromosome boundaries in `TWO_CHROMS` fall on tile boundaries at both
//! resolutions, so column `j` of tile `x` is simply genome bin
//! `x * tile_size + j`.

use std::sync::Arc;

use multivec_tiles::{ChunkMatrix, MemoryBackend, MultivecConfig, TileFetcher};
use test_utils::{
    assert_approx_eq, assert_values_approx_eq, bin_count, chroms, coverage_rows, indexed_rows,
    layout, rows_with_gaps, two_chrom_zattrs,
};

const CHANNELS: usize = layout::CHANNELS as usize;
const TILE_SIZE: usize = layout::TILE_SIZE as usize;

/// Backend holding every chromosome at every resolution, chromosome `i`
/// rows starting at `i * 100_000`.
fn indexed_backend() -> MemoryBackend {
    let mut backend = MemoryBackend::new().with_metadata_json(&two_chrom_zattrs());
    for (i, (name, size)) in chroms::TWO_CHROMS.iter().enumerate() {
        for &resolution in layout::RESOLUTIONS {
            let bins = bin_count(*size, resolution) as usize;
            let rows = indexed_rows(CHANNELS, bins, (i * 100_000) as f32);
            backend = backend.with_array(*name, resolution, ChunkMatrix::from_rows(rows).unwrap());
        }
    }
    backend
}

/// Expected value of genome bin `bin` in `channel` at `resolution`.
fn expected_value(resolution: u64, channel: usize, bin: u64) -> f32 {
    let mut first = 0;
    for (i, (_, size)) in chroms::TWO_CHROMS.iter().enumerate() {
        let bins = bin_count(*size, resolution);
        if bin < first + bins {
            return (i * 100_000 + channel * 1000) as f32 + (bin - first) as f32;
        }
        first += bins;
    }
    0.0
}

#[tokio::test]
async fn test_every_tile_matches_genome_bins() {
    let fetcher = TileFetcher::new(Arc::new(indexed_backend()), MultivecConfig::default());

    for (zoom, &resolution) in layout::RESOLUTIONS.iter().enumerate() {
        let genome_bins: u64 = chroms::TWO_CHROMS
            .iter()
            .map(|(_, size)| bin_count(*size, resolution))
            .sum();
        let tiles = genome_bins.div_ceil(TILE_SIZE as u64) + 1;

        let ids: Vec<String> = (0..tiles).map(|x| format!("{}.{}", zoom, x)).collect();
        let batch = fetcher.fetch_tiles(&ids).await;
        assert_eq!(batch.len(), ids.len());

        for x in 0..tiles {
            let tile = batch[&format!("{}.{}", zoom, x)].as_ref().unwrap();
            for channel in 0..CHANNELS {
                for (j, value) in tile.row(channel).iter().enumerate() {
                    let bin = x * TILE_SIZE as u64 + j as u64;
                    assert_eq!(
                        *value,
                        expected_value(resolution, channel, bin),
                        "zoom {} tile {} channel {} column {}",
                        zoom,
                        x,
                        channel,
                        j
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_duplicate_and_invalid_ids() {
    let fetcher = TileFetcher::new(Arc::new(indexed_backend()), MultivecConfig::default());

    let batch = fetcher
        .fetch_tiles(["0.0", "0.0", "", "1", "1.", ".1", "-1.0", "0.x", "2.1.1"])
        .await;

    assert_eq!(batch.len(), 1);
    assert!(batch.contains_key("0.0"));
}

#[tokio::test]
async fn test_coverage_signal_values() {
    let rows = coverage_rows(CHANNELS, 10, 5.0);
    let backend = MemoryBackend::new()
        .with_metadata_json(&two_chrom_zattrs())
        .with_array("chr1", 100, ChunkMatrix::from_rows(rows.clone()).unwrap());
    let fetcher = TileFetcher::new(Arc::new(backend), MultivecConfig::default());

    let batch = fetcher.fetch_tiles(["0.0"]).await;
    let tile = batch["0.0"].as_ref().unwrap();

    for channel in 0..CHANNELS {
        assert_values_approx_eq!(tile.row(channel), rows[channel].as_slice(), 1e-6);
    }

    let expected_max = rows.iter().flatten().fold(0.0f32, |m, v| m.max(*v));
    assert_approx_eq!(tile.extrema.max, expected_max, 1e-6);
    assert_eq!(tile.extrema.min, 0.0);
}

#[tokio::test]
async fn test_missing_values_propagate_to_extrema() {
    let rows = rows_with_gaps(CHANNELS, 10, 4);
    let backend = MemoryBackend::new()
        .with_metadata_json(&two_chrom_zattrs())
        .with_array("chr1", 100, ChunkMatrix::from_rows(rows).unwrap());
    let fetcher = TileFetcher::new(Arc::new(backend), MultivecConfig::default());

    let batch = fetcher.fetch_tiles(["0.0"]).await;
    let tile = batch["0.0"].as_ref().unwrap();

    assert!(tile.extrema.min.is_nan());
    assert!(tile.extrema.max.is_nan());
    // Row 1 is c + b = 1..=10 without bins 0, 4, 8
    assert_eq!(tile.extrema.row_min[1], Some(2.0));
    assert_eq!(tile.extrema.row_max[1], Some(10.0));
    assert_eq!(tile.extrema.min_non_zero, Some(1.0));
}

#[tokio::test]
async fn test_tile_json_shape() {
    let fetcher = TileFetcher::new(Arc::new(indexed_backend()), MultivecConfig::default());
    let batch = fetcher.fetch_tiles(["1.3"]).await;
    let tile = batch["1.3"].as_ref().unwrap();

    let json = serde_json::to_value(tile).unwrap();
    assert_eq!(json["tileId"], "1.3");
    assert_eq!(json["tilePositionId"], "1.3");
    assert_eq!(json["zoomLevel"], 1);
    assert_eq!(json["tilePos"], serde_json::json!([3]));
    assert_eq!(json["dtype"], "float32");
    assert_eq!(json["shape"], serde_json::json!([10, 2]));
    assert_eq!(json["dense"].as_array().map(Vec::len), Some(20));
    assert!(json.get("min_value").is_some());
    assert!(json.get("maxNonZero").is_some());
    assert_eq!(json["rowMin"].as_array().map(Vec::len), Some(2));
}
