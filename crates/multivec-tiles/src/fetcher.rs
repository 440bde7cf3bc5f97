//! Tile fetching: metadata resolution plus the per-tile pipeline.
//!
//! ```text
//! fetch_tiles(["0.0", "0.1", "abc"])
//!      │
//!      ├─► parse ids ("abc" dropped with a warning)
//!      │
//!      ├─► tileset_info()  (memoized in a OnceCell)
//!      │
//!      └─► for every tile, concurrently:
//!               plan_chunks ─► read_chunk × N (concurrent) ─► assemble_planned
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};

use crate::assemble::assemble_planned;
use crate::backend::MultivecBackend;
use crate::config::MultivecConfig;
use crate::error::Result;
use crate::planner::plan_chunks;
use crate::tileset::TilesetInfo;
use crate::types::{DenseTile, GenomicRange, TilePosition};

/// Element type tag of every dense tile.
pub const DENSE_DTYPE: &str = "float32";

/// Results of one batch, keyed by the identifier each tile was requested with.
pub type TileBatch = HashMap<String, Result<DenseTile>>;

/// Metadata resolution state of a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetcherState {
    /// Nothing requested yet.
    Idle,
    ResolvingMetadata,
    /// Metadata resolved; tiles can be served.
    Ready,
    /// The last resolution attempt failed with the given message.
    MetadataFailed(String),
}

/// Progress of one tile through its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStage {
    Planning,
    FetchingChunks,
    Assembling,
    Done,
    FetchFailed,
}

impl fmt::Display for TileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::FetchingChunks => "fetching_chunks",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::FetchFailed => "fetch_failed",
        };
        f.write_str(name)
    }
}

/// Tileset info as reported to clients: the info itself or an error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TilesetInfoReport {
    Info(Arc<TilesetInfo>),
    Error { error: String },
}

impl TilesetInfoReport {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Fetcher state stamped with the resolution attempt that produced it.
///
/// Only the most recent attempt may move the state out of
/// `ResolvingMetadata`, so a slow attempt finishing late cannot overwrite the
/// outcome of a newer one.
#[derive(Debug)]
struct StateSlot {
    attempt: u64,
    state: FetcherState,
}

impl StateSlot {
    fn new(state: FetcherState) -> RwLock<Self> {
        RwLock::new(Self { attempt: 0, state })
    }
}

/// Serves dense tiles for one multivec dataset.
pub struct TileFetcher {
    backend: Arc<dyn MultivecBackend>,
    config: MultivecConfig,
    info: OnceCell<Arc<TilesetInfo>>,
    state: RwLock<StateSlot>,
}

impl TileFetcher {
    pub fn new(backend: Arc<dyn MultivecBackend>, config: MultivecConfig) -> Self {
        Self {
            backend,
            config,
            info: OnceCell::new(),
            state: StateSlot::new(FetcherState::Idle),
        }
    }

    /// Create a fetcher whose metadata is already known.
    pub fn with_tileset_info(
        backend: Arc<dyn MultivecBackend>,
        config: MultivecConfig,
        info: TilesetInfo,
    ) -> Self {
        Self {
            backend,
            config,
            info: OnceCell::new_with(Some(Arc::new(info))),
            state: StateSlot::new(FetcherState::Ready),
        }
    }

    pub fn config(&self) -> &MultivecConfig {
        &self.config
    }

    pub async fn state(&self) -> FetcherState {
        self.state.read().await.state.clone()
    }

    /// Resolved tileset metadata.
    ///
    /// With `memoize_metadata` the document is read at most once per
    /// successful resolution; a failure leaves nothing cached, so the next
    /// call tries again.
    pub async fn tileset_info(&self) -> Result<Arc<TilesetInfo>> {
        if let Some(info) = self.info.get() {
            return Ok(Arc::clone(info));
        }

        if self.config.memoize_metadata {
            self.info
                .get_or_try_init(|| self.resolve_metadata())
                .await
                .map(Arc::clone)
        } else {
            self.resolve_metadata().await
        }
    }

    async fn resolve_metadata(&self) -> Result<Arc<TilesetInfo>> {
        let attempt = self.begin_resolution().await;

        let resolved = match self.backend.read_metadata().await {
            Ok(document) => TilesetInfo::from_document(&document),
            Err(e) => Err(e),
        };

        match resolved {
            Ok(info) => {
                tracing::info!(
                    chromosomes = info.chrom_sizes.len(),
                    resolutions = info.resolutions.len(),
                    tile_size = info.tile_size,
                    max_width = info.max_width,
                    max_zoom = info.max_zoom,
                    "Resolved multivec metadata"
                );
                self.finish_resolution(attempt, FetcherState::Ready).await;
                Ok(Arc::new(info))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve multivec metadata");
                self.finish_resolution(attempt, FetcherState::MetadataFailed(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn begin_resolution(&self) -> u64 {
        let mut slot = self.state.write().await;
        slot.attempt += 1;
        slot.state = FetcherState::ResolvingMetadata;
        slot.attempt
    }

    async fn finish_resolution(&self, attempt: u64, outcome: FetcherState) {
        let mut slot = self.state.write().await;
        if slot.attempt == attempt {
            slot.state = outcome;
        } else {
            tracing::debug!(
                attempt,
                latest = slot.attempt,
                "Discarding outcome of superseded metadata resolution"
            );
        }
    }

    /// Tileset info, or an error object describing why it is unavailable.
    pub async fn get_tileset_info(&self) -> TilesetInfoReport {
        self.get_tileset_info_with(|_| {}).await
    }

    /// Like [`get_tileset_info`](Self::get_tileset_info), also handing the
    /// report to `observer` exactly once.
    pub async fn get_tileset_info_with<F>(&self, observer: F) -> TilesetInfoReport
    where
        F: FnOnce(&TilesetInfoReport),
    {
        let report = match self.tileset_info().await {
            Ok(info) => TilesetInfoReport::Info(info),
            Err(e) => TilesetInfoReport::Error {
                error: format!("Error parsing zarr multivec: {}", e),
            },
        };
        observer(&report);
        report
    }

    /// Fetch one tile.
    pub async fn fetch_tile(&self, tile_id: &str, position: TilePosition) -> Result<DenseTile> {
        let info = self.tileset_info().await?;
        self.run_pipeline(&info, tile_id, position).await
    }

    /// Fetch every tile in `tile_ids` concurrently.
    ///
    /// Identifiers that are not `"{z}.{x}"` are logged and left out of the
    /// batch. Each remaining identifier maps to its own result, so one
    /// failing tile never hides the others.
    pub async fn fetch_tiles<I, S>(&self, tile_ids: I) -> TileBatch
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requests: Vec<(String, TilePosition)> = tile_ids
            .into_iter()
            .filter_map(|id| {
                let id = id.as_ref();
                match id.parse::<TilePosition>() {
                    Ok(position) => Some((id.to_string(), position)),
                    Err(e) => {
                        tracing::warn!(tile_id = %id, error = %e, "Dropping invalid tile identifier");
                        None
                    }
                }
            })
            .collect();

        if requests.is_empty() {
            return TileBatch::new();
        }

        let info = match self.tileset_info().await {
            Ok(info) => info,
            Err(e) => {
                return requests
                    .into_iter()
                    .map(|(id, _)| (id, Err(e.clone())))
                    .collect();
            }
        };

        let results = join_all(requests.iter().map(|(id, position)| {
            let info = &info;
            async move { (id.clone(), self.run_pipeline(info, id, *position).await) }
        }))
        .await;

        results.into_iter().collect()
    }

    /// Like [`fetch_tiles`](Self::fetch_tiles), handing the batch to
    /// `receiver` instead of returning it.
    pub async fn fetch_tiles_with<I, S, F>(&self, tile_ids: I, receiver: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnOnce(TileBatch),
    {
        let batch = self.fetch_tiles(tile_ids).await;
        receiver(batch);
    }

    async fn run_pipeline(
        &self,
        info: &TilesetInfo,
        tile_id: &str,
        position: TilePosition,
    ) -> Result<DenseTile> {
        let result = self.build_tile(info, tile_id, position).await;
        match &result {
            Ok(_) => tracing::debug!(tile_id = %tile_id, stage = %TileStage::Done, "Tile ready"),
            Err(e) => tracing::warn!(
                tile_id = %tile_id,
                stage = %TileStage::FetchFailed,
                error = %e,
                "Tile fetch failed"
            ),
        }
        result
    }

    async fn build_tile(
        &self,
        info: &TilesetInfo,
        tile_id: &str,
        position: TilePosition,
    ) -> Result<DenseTile> {
        tracing::debug!(tile_id = %tile_id, stage = %TileStage::Planning, "Planning tile");
        let resolution = info.resolution_for_zoom(position.zoom)?;
        let range = GenomicRange::for_tile(position.x, info.tile_size, resolution);
        let plan = plan_chunks(
            &info.chrom_sizes,
            range.start,
            range.end,
            resolution,
            info.tile_size,
        )?;

        tracing::debug!(
            tile_id = %tile_id,
            stage = %TileStage::FetchingChunks,
            resolution,
            start = range.start,
            end = range.end,
            chunks = plan.chunks.len(),
            padding = plan.padding(),
            "Fetching tile chunks"
        );
        let requests = plan.requests(resolution);
        let chunks = try_join_all(requests.iter().map(|r| self.backend.read_chunk(r))).await?;

        tracing::debug!(tile_id = %tile_id, stage = %TileStage::Assembling, "Assembling tile");
        let tile = assemble_planned(&plan, &chunks, info.output_shape())?;

        Ok(DenseTile {
            tile_id: tile_id.to_string(),
            tile_position_id: tile_id.to_string(),
            zoom_level: position.zoom,
            tile_pos: [position.x],
            dense: tile.data,
            dtype: DENSE_DTYPE.to_string(),
            shape: info.shape,
            extrema: tile.extrema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::MultivecError;
    use crate::types::{ChunkMatrix, ChunkRequest};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use test_utils::{bin_count, chroms, indexed_rows, layout, multivec_zattrs, two_chrom_zattrs};

    /// chr1 and chr2 at resolution 100 only; chr1 rows start at 0, chr2 rows
    /// at 10_000.
    fn two_chrom_backend() -> MemoryBackend {
        let chr1 = ChunkMatrix::from_rows(indexed_rows(2, 10, 0.0)).unwrap();
        let chr2 = ChunkMatrix::from_rows(indexed_rows(2, 20, 10_000.0)).unwrap();
        MemoryBackend::new()
            .with_metadata_json(&two_chrom_zattrs())
            .with_array("chr1", 100, chr1)
            .with_array("chr2", 100, chr2)
    }

    fn fetcher(backend: MemoryBackend) -> (TileFetcher, Arc<MemoryBackend>) {
        let backend = Arc::new(backend);
        let fetcher = TileFetcher::new(backend.clone(), MultivecConfig::default());
        (fetcher, backend)
    }

    #[tokio::test]
    async fn test_tileset_info() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        assert_eq!(fetcher.state().await, FetcherState::Idle);

        let info = fetcher.tileset_info().await.unwrap();
        assert_eq!(info.shape, [10, 2]);
        assert_eq!(info.max_width, 3000);
        assert_eq!(info.resolutions, layout::RESOLUTIONS.to_vec());
        assert_eq!(info.chrom_sizes.len(), chroms::TWO_CHROMS.len());
        assert_eq!(fetcher.state().await, FetcherState::Ready);
    }

    #[tokio::test]
    async fn test_first_tile_within_chr1() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        let tile = fetcher
            .fetch_tile("0.0", TilePosition::new(0, 0))
            .await
            .unwrap();

        assert_eq!(tile.shape, [10, 2]);
        assert_eq!(tile.dtype, "float32");
        assert_eq!(tile.zoom_level, 0);
        assert_eq!(tile.tile_pos, [0]);
        assert_eq!(tile.row(0), indexed_rows(1, 10, 0.0)[0].as_slice());
        assert_eq!(tile.row(1)[0], 1000.0);
        assert_eq!(tile.extrema.min, 0.0);
        assert_eq!(tile.extrema.max, 1009.0);
        assert_eq!(tile.extrema.min_non_zero, Some(1.0));
    }

    #[tokio::test]
    async fn test_second_tile_starts_chr2() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        let tile = fetcher
            .fetch_tile("0.1", TilePosition::new(0, 1))
            .await
            .unwrap();

        // [1000, 2000) is chr2 local [0, 1000), bins [0, 10)
        assert_eq!(tile.row(0)[0], 10_000.0);
        assert_eq!(tile.row(0)[9], 10_009.0);
        assert_eq!(tile.row(1)[9], 11_009.0);
    }

    #[tokio::test]
    async fn test_tile_past_genome_end_is_zero() {
        let (fetcher, backend) = fetcher(two_chrom_backend());
        let tile = fetcher
            .fetch_tile("0.3", TilePosition::new(0, 3))
            .await
            .unwrap();

        assert!(tile.dense.iter().all(|v| *v == 0.0));
        assert_eq!(tile.dense.len(), 20);
        assert_eq!(tile.extrema.min_non_zero, None);
        assert_eq!(tile.extrema.max_non_zero, None);
        assert_eq!(backend.chunk_reads(), 0);
    }

    #[tokio::test]
    async fn test_batch_drops_invalid_ids() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        let batch = fetcher.fetch_tiles(["0.0", "abc"]).await;

        assert_eq!(batch.len(), 1);
        let tile = batch["0.0"].as_ref().unwrap();
        assert_eq!(tile.tile_id, "0.0");
        assert_eq!(tile.tile_position_id, "0.0");
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        // Zoom 1 has no arrays in the backend; zoom 7 has no resolution.
        let batch = fetcher.fetch_tiles(["0.0", "0.2", "1.0", "7.0"]).await;

        assert_eq!(batch.len(), 4);
        assert!(batch["0.0"].is_ok());
        assert!(batch["0.2"].is_ok());
        assert!(matches!(batch["1.0"], Err(MultivecError::ChunkRead { .. })));
        assert_eq!(
            batch["7.0"],
            Err(MultivecError::ZoomOutOfRange {
                zoom: 7,
                available: 2
            })
        );
    }

    #[tokio::test]
    async fn test_metadata_memoized_across_batches() {
        let (fetcher, backend) = fetcher(two_chrom_backend());

        fetcher.fetch_tiles(["0.0", "0.1", "0.2"]).await;
        fetcher.fetch_tiles(["0.0"]).await;
        fetcher.get_tileset_info().await;

        assert_eq!(backend.metadata_reads(), 1);
        assert_eq!(backend.chunk_reads(), 4);
    }

    #[tokio::test]
    async fn test_metadata_not_memoized() {
        let backend = Arc::new(two_chrom_backend());
        let config = MultivecConfig {
            memoize_metadata: false,
            ..MultivecConfig::default()
        };
        let fetcher = TileFetcher::new(backend.clone(), config);

        fetcher.fetch_tiles(["0.0", "0.1"]).await;
        fetcher.fetch_tiles(["0.0"]).await;

        // Once per batch
        assert_eq!(backend.metadata_reads(), 2);
    }

    #[tokio::test]
    async fn test_metadata_failure() {
        let (fetcher, backend) = fetcher(MemoryBackend::new());

        let batch = fetcher.fetch_tiles(["0.0", "0.1"]).await;
        assert_eq!(batch.len(), 2);
        assert!(batch.values().all(|r| matches!(r, Err(e) if e.is_metadata())));
        assert!(matches!(fetcher.state().await, FetcherState::MetadataFailed(_)));

        // Failure is not cached
        fetcher.tileset_info().await.unwrap_err();
        assert_eq!(backend.metadata_reads(), 2);
    }

    #[tokio::test]
    async fn test_get_tileset_info_reports_error() {
        let (fetcher, _) = fetcher(MemoryBackend::new().with_metadata("{not json"));

        let seen = Mutex::new(0);
        let report = fetcher
            .get_tileset_info_with(|_| *seen.lock().unwrap() += 1)
            .await;

        assert_eq!(*seen.lock().unwrap(), 1);
        match report {
            TilesetInfoReport::Error { error } => {
                assert!(error.starts_with("Error parsing zarr multivec:"));
            }
            other => panic!("expected an error report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_tileset_info_serializes_info() {
        let (fetcher, _) = fetcher(two_chrom_backend());
        let report = fetcher.get_tileset_info().await;
        assert!(!report.is_error());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tile_size"], 10);
        assert_eq!(json["max_pos"], serde_json::json!([3000]));
        assert_eq!(json["chromSizes"][1], serde_json::json!(["chr2", 2000]));
        assert!(json.get("row_infos").is_some());
    }

    #[tokio::test]
    async fn test_fetch_tiles_with_receiver() {
        let (fetcher, _) = fetcher(two_chrom_backend());

        let received = Mutex::new(None);
        fetcher
            .fetch_tiles_with(vec!["0.1".to_string()], |batch| {
                *received.lock().unwrap() = Some(batch);
            })
            .await;

        let batch = received.lock().unwrap().take().unwrap();
        assert!(batch["0.1"].is_ok());
    }

    #[tokio::test]
    async fn test_preset_tileset_info_skips_metadata_read() {
        let backend = Arc::new(two_chrom_backend());
        let info = TilesetInfo::from_document(two_chrom_zattrs().to_string().as_bytes()).unwrap();
        let fetcher =
            TileFetcher::with_tileset_info(backend.clone(), MultivecConfig::default(), info);

        assert_eq!(fetcher.state().await, FetcherState::Ready);
        assert!(fetcher.fetch_tiles(["0.0"]).await["0.0"].is_ok());
        assert_eq!(backend.metadata_reads(), 0);
    }

    /// First metadata read fails after `delay`; later reads succeed at once.
    struct FlakyMetadataBackend {
        inner: MemoryBackend,
        delay: Duration,
        metadata_calls: AtomicUsize,
    }

    #[async_trait]
    impl MultivecBackend for FlakyMetadataBackend {
        async fn read_metadata(&self) -> Result<Bytes> {
            if self.metadata_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(self.delay).await;
                return Err(MultivecError::metadata("transient"));
            }
            self.inner.read_metadata().await
        }

        async fn read_chunk(&self, request: &ChunkRequest) -> Result<ChunkMatrix> {
            self.inner.read_chunk(request).await
        }
    }

    /// Delays every chunk read and records how many were in flight at once.
    struct SlowChunkBackend {
        inner: MemoryBackend,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowChunkBackend {
        fn new(inner: MemoryBackend) -> Self {
            Self {
                inner,
                delay: Duration::from_millis(20),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MultivecBackend for SlowChunkBackend {
        async fn read_metadata(&self) -> Result<Bytes> {
            self.inner.read_metadata().await
        }

        async fn read_chunk(&self, request: &ChunkRequest) -> Result<ChunkMatrix> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let result = self.inner.read_chunk(request).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn test_late_failure_does_not_override_newer_success() {
        let backend = FlakyMetadataBackend {
            inner: two_chrom_backend(),
            delay: Duration::from_millis(100),
            metadata_calls: AtomicUsize::new(0),
        };
        let config = MultivecConfig {
            memoize_metadata: false,
            ..MultivecConfig::default()
        };
        let fetcher = TileFetcher::new(Arc::new(backend), config);

        let (first, second) = tokio::join!(fetcher.tileset_info(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fetcher.tileset_info().await
        });

        assert!(first.is_err());
        assert!(second.is_ok());
        assert_eq!(fetcher.state().await, FetcherState::Ready);

        // A newer failure is still reported
        let fetcher = TileFetcher::new(
            Arc::new(MemoryBackend::new()),
            MultivecConfig {
                memoize_metadata: false,
                ..MultivecConfig::default()
            },
        );
        fetcher.tileset_info().await.unwrap_err();
        assert!(matches!(fetcher.state().await, FetcherState::MetadataFailed(_)));
    }

    #[tokio::test]
    async fn test_batch_tiles_read_concurrently() {
        let backend = Arc::new(SlowChunkBackend::new(two_chrom_backend()));
        let fetcher = TileFetcher::new(backend.clone(), MultivecConfig::default());

        let batch = fetcher.fetch_tiles(["0.0", "0.1", "0.2"]).await;

        assert!(batch.values().all(|r| r.is_ok()));
        assert_eq!(backend.inner.chunk_reads(), 3);
        assert_eq!(backend.peak(), 3);
    }

    #[tokio::test]
    async fn test_boundary_tile_chunks_read_concurrently() {
        // chrA 1234, chrB 567, chrC 89: tile 0.1 covers [1000, 2000) and
        // touches all three chromosomes.
        let mut inner = MemoryBackend::new().with_metadata_json(&multivec_zattrs(
            chroms::RAGGED,
            &[100],
            layout::CHANNELS,
            layout::TILE_SIZE,
        ));
        for (i, (name, size)) in chroms::RAGGED.iter().enumerate() {
            let rows = indexed_rows(2, bin_count(*size, 100) as usize, (i * 10_000) as f32);
            inner = inner.with_array(*name, 100, ChunkMatrix::from_rows(rows).unwrap());
        }
        let backend = Arc::new(SlowChunkBackend::new(inner));
        let fetcher = TileFetcher::new(backend.clone(), MultivecConfig::default());

        let tile = fetcher
            .fetch_tile("0.1", TilePosition::new(0, 1))
            .await
            .unwrap();

        // chrA bins 10..13, chrB bins 0..6, chrC bin 0
        assert_eq!(&tile.row(0)[..4], &[10.0, 11.0, 12.0, 10_000.0]);
        assert_eq!(tile.row(0)[9], 20_000.0);
        assert_eq!(backend.inner.chunk_reads(), 3);
        assert_eq!(backend.peak(), 3);
    }
}
