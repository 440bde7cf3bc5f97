//! Tile assembly for multi-resolution genomic "multivec" data.
//!
//! A multivec dataset stores each chromosome separately, at several bin
//! sizes, as a `[channels, bins]` array. Clients address the genome as one
//! concatenated axis and ask for fixed-width tiles `"{z}.{x}"`. This crate
//! turns such a request into per-chromosome reads and assembles the results
//! into a dense, zero-padded tile:
//!
//! - **Partial reads**: only the bins a tile covers are fetched
//! - **Boundary aware**: tiles spanning chromosome boundaries are stitched
//! - **Concurrent**: chunk reads within a tile and tiles within a batch run
//!   concurrently
//!
//! # Architecture
//!
//! ```text
//! TileFetcher::fetch_tiles(["z.x", ...])
//!      │
//!      ├─► TilesetInfo::from_document   (once, memoized)
//!      │
//!      └─► per tile
//!            ├─► GenomicRange::for_tile
//!            ├─► plan_chunks ─► genomic_range_to_chromosomes
//!            ├─► MultivecBackend::read_chunk × N
//!            └─► assemble_planned + compute_extrema
//!                     │
//!                     ▼
//!                DenseTile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use multivec_tiles::{open_storage, MultivecConfig, StoreConfig, TileFetcher, ZarrMultivecStore};
//!
//! let storage = open_storage(&StoreConfig::Http { url: "https://example.org/sample.zarr".into() })?;
//! let backend = ZarrMultivecStore::new(storage, MultivecConfig::default());
//! let fetcher = TileFetcher::new(Arc::new(backend), MultivecConfig::default());
//!
//! let tiles = fetcher.fetch_tiles(["0.0", "1.1"]).await;
//! ```

pub mod assemble;
pub mod backend;
pub mod cache;
pub mod config;
pub mod coords;
pub mod error;
pub mod fetcher;
pub mod planner;
pub mod storage;
pub mod testdata;
pub mod tileset;
pub mod types;

// Re-export commonly used types at crate root
pub use assemble::{assemble, assemble_planned, compute_extrema, AssembledTile};
pub use backend::{MemoryBackend, MultivecBackend, ZarrMultivecStore};
pub use cache::{ArrayCache, ArrayKey};
pub use config::MultivecConfig;
pub use coords::{
    chromosome_offsets, genome_length, genomic_range_to_chromosomes, ChromosomeSegment,
};
pub use error::{MultivecError, Result};
pub use fetcher::{FetcherState, TileBatch, TileFetcher, TileStage, TilesetInfoReport};
pub use planner::{plan_chunks, ChromosomeChunkPlan, TilePlan};
pub use storage::{open_storage, S3Config, StoreConfig};
pub use tileset::TilesetInfo;
pub use types::{
    CacheStats, ChromSize, ChunkMatrix, ChunkRequest, DenseTile, GenomicRange, TileExtrema,
    TilePosition, TileShape,
};
