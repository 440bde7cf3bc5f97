//! Storage backends that serve multivec metadata and chromosome chunks.

mod memory;
mod zarr;

pub use memory::MemoryBackend;
pub use zarr::{ZarrArray, ZarrMultivecStore};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{ChunkMatrix, ChunkRequest};

/// Read access to a multivec dataset.
///
/// Both methods are the only points where tile fetching waits on I/O.
/// Implementations report failures but never retry; retry policy, if any,
/// belongs to the underlying store.
#[async_trait]
pub trait MultivecBackend: Send + Sync {
    /// Fetch the raw metadata document.
    ///
    /// Returns a `Metadata` error when the document does not exist.
    async fn read_metadata(&self) -> Result<Bytes>;

    /// Read bins `[bin_start, bin_end)` of every channel of one chromosome at
    /// one resolution.
    ///
    /// The returned matrix may be narrower than requested when the stored
    /// array ends early; it must never be wider. Failures are `ChunkRead`
    /// errors.
    async fn read_chunk(&self, request: &ChunkRequest) -> Result<ChunkMatrix>;
}
