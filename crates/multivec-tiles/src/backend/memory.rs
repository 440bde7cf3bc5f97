//! In-memory backend holding pre-loaded chromosome arrays.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::MultivecBackend;
use crate::error::{MultivecError, Result};
use crate::types::{ChunkMatrix, ChunkRequest};

/// Backend serving a metadata document and whole chromosome arrays from
/// memory. Counts reads so callers can observe access patterns.
#[derive(Default)]
pub struct MemoryBackend {
    metadata: Option<Bytes>,
    arrays: HashMap<(String, u64), ChunkMatrix>,
    metadata_reads: AtomicUsize,
    chunk_reads: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw metadata document.
    pub fn with_metadata(mut self, document: impl Into<Bytes>) -> Self {
        self.metadata = Some(document.into());
        self
    }

    /// Set the metadata document from a JSON value.
    pub fn with_metadata_json(self, document: &serde_json::Value) -> Self {
        self.with_metadata(document.to_string())
    }

    /// Add the full `channels × bins` array of one chromosome at one resolution.
    pub fn with_array(mut self, chrom: impl Into<String>, resolution: u64, array: ChunkMatrix) -> Self {
        self.arrays.insert((chrom.into(), resolution), array);
        self
    }

    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::Relaxed)
    }

    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MultivecBackend for MemoryBackend {
    async fn read_metadata(&self) -> Result<Bytes> {
        self.metadata_reads.fetch_add(1, Ordering::Relaxed);
        self.metadata
            .clone()
            .ok_or_else(|| MultivecError::metadata("metadata document not found"))
    }

    async fn read_chunk(&self, request: &ChunkRequest) -> Result<ChunkMatrix> {
        self.chunk_reads.fetch_add(1, Ordering::Relaxed);

        let array = self
            .arrays
            .get(&(request.chrom.clone(), request.resolution))
            .ok_or_else(|| MultivecError::chunk_read(request, "array not found"))?;

        let start = usize::try_from(request.bin_start).unwrap_or(usize::MAX);
        let end = usize::try_from(request.bin_end).unwrap_or(usize::MAX);
        Ok(array.slice_columns(start, end))
    }
}
