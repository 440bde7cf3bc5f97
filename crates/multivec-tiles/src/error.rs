//! Error types for multivec tile assembly.

use thiserror::Error;

/// Errors that can occur while resolving metadata or assembling tiles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MultivecError {
    /// The metadata document is missing or malformed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// A tile identifier is not of the form `"{z}.{x}"`.
    #[error("invalid tile identifier: {0:?}")]
    InvalidTileIdentifier(String),

    /// The requested zoom level has no resolution in the dataset.
    #[error("zoom level {zoom} is out of range (dataset has {available} resolutions)")]
    ZoomOutOfRange { zoom: u32, available: usize },

    /// Reading a chromosome chunk from the backend failed.
    #[error("failed to read chunk {chrom}/{resolution}[{bin_start}..{bin_end}]: {reason}")]
    ChunkRead {
        chrom: String,
        resolution: u64,
        bin_start: u64,
        bin_end: u64,
        reason: String,
    },

    /// A chunk does not fit the declared tile shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Storage/IO error outside of a specific chunk read.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MultivecError {
    /// Create a Metadata error.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a ChunkRead error for the given request.
    pub fn chunk_read(request: &crate::types::ChunkRequest, reason: impl Into<String>) -> Self {
        Self::ChunkRead {
            chrom: request.chrom.clone(),
            resolution: request.resolution,
            bin_start: request.bin_start,
            bin_end: request.bin_end,
            reason: reason.into(),
        }
    }

    /// Whether the error came from the metadata document.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }
}

impl From<std::io::Error> for MultivecError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MultivecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MultivecError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("blocking task failed: {}", err))
    }
}

/// Result type for multivec operations.
pub type Result<T> = std::result::Result<T, MultivecError>;
