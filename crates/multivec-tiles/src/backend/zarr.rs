//! Zarr backend: one 2-D array per chromosome and resolution.
//!
//! Layout (Zarr V2 or V3):
//!
//! ```text
//! store root
//! ├── .zattrs                          metadata document
//! └── chromosomes/
//!     ├── chr1/
//!     │   ├── 1000/   [channels, bins]
//!     │   └── 100/    [channels, bins]
//!     └── chr2/ ...
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{ReadableStorage, ReadableStorageTraits, StoreKey};

use super::MultivecBackend;
use crate::cache::ArrayCache;
use crate::config::MultivecConfig;
use crate::error::{MultivecError, Result};
use crate::types::{CacheStats, ChunkMatrix, ChunkRequest};

/// An opened chromosome array over any readable store.
pub type ZarrArray = Array<dyn ReadableStorageTraits>;

/// Multivec backend reading chromosome arrays with `zarrs`.
///
/// zarrs is synchronous, so every store access runs on the blocking pool.
/// Opened array handles are kept in an LRU cache keyed by
/// `(chromosome, resolution)`.
pub struct ZarrMultivecStore {
    storage: ReadableStorage,
    config: MultivecConfig,
    arrays: Mutex<ArrayCache<ZarrArray>>,
}

impl ZarrMultivecStore {
    /// Create a backend over `storage`.
    pub fn new(storage: ReadableStorage, config: MultivecConfig) -> Self {
        let arrays = Mutex::new(ArrayCache::new(config.array_cache_capacity));
        Self {
            storage,
            config,
            arrays,
        }
    }

    pub fn config(&self) -> &MultivecConfig {
        &self.config
    }

    /// Array handle cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.arrays.lock().await.stats()
    }

    /// Open (or reuse) the array for the request's chromosome and resolution.
    async fn array(&self, request: &ChunkRequest) -> Result<Arc<ZarrArray>> {
        {
            let mut cache = self.arrays.lock().await;
            if let Some(array) = cache.get(&request.chrom, request.resolution) {
                return Ok(array);
            }
        }

        let path = self.config.array_path(&request.chrom, request.resolution);
        tracing::debug!(path = %path, "Opening chromosome array");

        let storage = Arc::clone(&self.storage);
        let open_path = path.clone();
        let array = tokio::task::spawn_blocking(move || Array::open(storage, &open_path))
            .await?
            .map_err(|e| {
                MultivecError::chunk_read(request, format!("failed to open {}: {}", path, e))
            })?;

        let array = Arc::new(array);
        self.arrays
            .lock()
            .await
            .insert(&request.chrom, request.resolution, Arc::clone(&array));
        Ok(array)
    }
}

/// Read the `[bin_start, bin_end)` columns of every channel.
fn read_columns(array: &ZarrArray, request: &ChunkRequest) -> Result<ChunkMatrix> {
    let shape = array.shape();
    if shape.len() != 2 {
        return Err(MultivecError::chunk_read(
            request,
            format!("expected a 2-dimensional array, found shape {:?}", shape),
        ));
    }

    let (channels, bins) = (shape[0], shape[1]);
    let end = request.bin_end.min(bins);
    let start = request.bin_start.min(end);
    if start == end {
        return Ok(ChunkMatrix::zeros(channels as usize, 0));
    }

    // Zarr uses [channel, bin] indexing
    let subset = ArraySubset::new_with_start_shape(vec![0, start], vec![channels, end - start])
        .map_err(|e| MultivecError::chunk_read(request, e.to_string()))?;

    let data: Vec<f32> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| MultivecError::chunk_read(request, e.to_string()))?;

    ChunkMatrix::new(channels as usize, (end - start) as usize, data)
}

/// Fetch the metadata document, falling back to the `attributes` of a V3
/// root `zarr.json`.
fn read_metadata_document(storage: &ReadableStorage, metadata_key: &str) -> Result<Option<Bytes>> {
    let key = StoreKey::new(metadata_key)
        .map_err(|e| MultivecError::metadata(format!("invalid metadata key: {}", e)))?;
    if let Some(bytes) = storage
        .get(&key)
        .map_err(|e| MultivecError::storage(e.to_string()))?
    {
        return Ok(Some(bytes));
    }

    let root_key =
        StoreKey::new("zarr.json").map_err(|e| MultivecError::storage(e.to_string()))?;
    let Some(root) = storage
        .get(&root_key)
        .map_err(|e| MultivecError::storage(e.to_string()))?
    else {
        return Ok(None);
    };

    let root: serde_json::Value = serde_json::from_slice(&root)?;
    match root.get("attributes") {
        Some(attributes) => Ok(Some(Bytes::from(serde_json::to_vec(attributes)?))),
        None => Ok(None),
    }
}

#[async_trait]
impl MultivecBackend for ZarrMultivecStore {
    async fn read_metadata(&self) -> Result<Bytes> {
        let storage = Arc::clone(&self.storage);
        let metadata_key = self.config.metadata_key.clone();

        let document =
            tokio::task::spawn_blocking(move || read_metadata_document(&storage, &metadata_key))
                .await??;

        document.ok_or_else(|| {
            MultivecError::metadata(format!(
                "metadata document {} not found",
                self.config.metadata_key
            ))
        })
    }

    async fn read_chunk(&self, request: &ChunkRequest) -> Result<ChunkMatrix> {
        let array = self.array(request).await?;

        tracing::debug!(
            chrom = %request.chrom,
            resolution = request.resolution,
            bin_start = request.bin_start,
            bin_end = request.bin_end,
            "Reading chromosome chunk"
        );

        let owned = request.clone();
        tokio::task::spawn_blocking(move || read_columns(&array, &owned)).await?
    }
}
