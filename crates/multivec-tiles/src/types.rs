//! Core types for multivec tile assembly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MultivecError, Result};

/// Name and length (in base pairs) of one chromosome.
///
/// Serialized as a `[name, size]` pair, the form clients expect in
/// `chromSizes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u64)", into = "(String, u64)")]
pub struct ChromSize {
    pub name: String,
    pub size: u64,
}

impl ChromSize {
    /// Create a new chromosome entry.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Number of bins needed to cover this chromosome at `bin_size`.
    pub fn bin_count(&self, bin_size: u64) -> u64 {
        self.size.div_ceil(bin_size)
    }
}

impl From<(String, u64)> for ChromSize {
    fn from((name, size): (String, u64)) -> Self {
        Self { name, size }
    }
}

impl From<ChromSize> for (String, u64) {
    fn from(chrom: ChromSize) -> Self {
        (chrom.name, chrom.size)
    }
}

/// A tile address: zoom level and tile index along the genome axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePosition {
    pub zoom: u32,
    pub x: u64,
}

impl TilePosition {
    pub fn new(zoom: u32, x: u64) -> Self {
        Self { zoom, x }
    }
}

impl FromStr for TilePosition {
    type Err = MultivecError;

    /// Parse a `"{z}.{x}"` identifier.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MultivecError::InvalidTileIdentifier(s.to_string());

        let (z, x) = s.split_once('.').ok_or_else(invalid)?;
        let zoom = z.parse::<u32>().map_err(|_| invalid())?;
        let x = x.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { zoom, x })
    }
}

impl fmt::Display for TilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.zoom, self.x)
    }
}

/// Absolute `[start, end)` range on the concatenated genome axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomicRange {
    pub start: i64,
    pub end: i64,
}

impl GenomicRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range covered by tile `x` when each tile spans `tile_size` bins of
    /// `resolution` base pairs.
    pub fn for_tile(x: u64, tile_size: usize, resolution: u64) -> Self {
        let span = (tile_size as i64).saturating_mul(resolution.min(i64::MAX as u64) as i64);
        let start = i64::try_from(x).unwrap_or(i64::MAX).saturating_mul(span);
        Self {
            start,
            end: start.saturating_add(span),
        }
    }
}

/// One read against the chunk backend, in bin units local to a chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkRequest {
    pub chrom: String,
    pub resolution: u64,
    pub bin_start: u64,
    pub bin_end: u64,
}

impl ChunkRequest {
    pub fn width(&self) -> usize {
        self.bin_end.saturating_sub(self.bin_start) as usize
    }
}

/// Row-major `channels × width` block of values returned by a chunk read.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatrix {
    channels: usize,
    width: usize,
    data: Vec<f32>,
}

impl ChunkMatrix {
    /// Wrap row-major data, checking it holds exactly `channels * width` values.
    pub fn new(channels: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != channels * width {
            return Err(MultivecError::shape_mismatch(format!(
                "chunk data has {} values, expected {} ({} channels x {} bins)",
                data.len(),
                channels * width,
                channels,
                width
            )));
        }
        Ok(Self {
            channels,
            width,
            data,
        })
    }

    /// Build a matrix from one `Vec` per channel. All rows must share a length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let channels = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(MultivecError::shape_mismatch(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        Ok(Self {
            channels,
            width,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn zeros(channels: usize, width: usize) -> Self {
        Self {
            channels,
            width,
            data: vec![0.0; channels * width],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Values of one channel.
    pub fn row(&self, channel: usize) -> &[f32] {
        &self.data[channel * self.width..(channel + 1) * self.width]
    }

    /// Copy of the columns `[start, end)`, clipped to the matrix width.
    pub fn slice_columns(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.width);
        let start = start.min(end);
        let width = end - start;
        let mut data = Vec::with_capacity(self.channels * width);
        for channel in 0..self.channels {
            data.extend_from_slice(&self.row(channel)[start..end]);
        }
        Self {
            channels: self.channels,
            width,
            data,
        }
    }
}

/// Output shape of an assembled tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    pub channels: usize,
    pub width: usize,
}

impl TileShape {
    pub fn new(channels: usize, width: usize) -> Self {
        Self { channels, width }
    }

    pub fn len(&self) -> usize {
        self.channels * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary statistics of an assembled tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileExtrema {
    /// Smallest value; NaN if any value is NaN.
    #[serde(rename = "min_value")]
    pub min: f32,
    /// Largest value; NaN if any value is NaN.
    #[serde(rename = "max_value")]
    pub max: f32,
    /// Smallest value with `|v| > 0`, if any.
    #[serde(rename = "minNonZero")]
    pub min_non_zero: Option<f32>,
    /// Largest value with `|v| > 0`, if any.
    #[serde(rename = "maxNonZero")]
    pub max_non_zero: Option<f32>,
    /// Per-channel minimum over finite values.
    #[serde(rename = "rowMin")]
    pub row_min: Vec<Option<f32>>,
    /// Per-channel maximum over finite values.
    #[serde(rename = "rowMax")]
    pub row_max: Vec<Option<f32>>,
}

/// A fully assembled, zero-padded tile returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseTile {
    /// Identifier the tile was requested with.
    #[serde(rename = "tileId")]
    pub tile_id: String,
    /// Same as `tile_id`, for lookups keyed by position.
    #[serde(rename = "tilePositionId")]
    pub tile_position_id: String,
    #[serde(rename = "zoomLevel")]
    pub zoom_level: u32,
    #[serde(rename = "tilePos")]
    pub tile_pos: [u64; 1],
    /// Row-major `channels × tile_width` values.
    pub dense: Vec<f32>,
    pub dtype: String,
    /// Declared tileset shape, `[tile_width, channels]`.
    pub shape: [usize; 2],
    #[serde(flatten)]
    pub extrema: TileExtrema,
}

impl DenseTile {
    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[0]
    }

    /// Values of one channel.
    pub fn row(&self, channel: usize) -> &[f32] {
        let width = self.width();
        &self.dense[channel * width..(channel + 1) * width]
    }
}

/// Statistics about a lookup cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
