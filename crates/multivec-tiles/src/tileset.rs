//! Dataset-level metadata for a multivec tileset.
//!
//! The metadata document (`.zattrs` at the store root) describes every
//! chromosome's offset and size, the available resolutions and the stored
//! tile shape. [`TilesetInfo::from_document`] turns it into the summary
//! clients need for tile addressing:
//!
//! ```text
//! {
//!   "multiscales": [ { "name": "chr1", "metadata": { "chromoffset": 0, "chromsize": 1000 } }, ... ],
//!   "resolutions": [100, 10, 1],
//!   "shape": [channels, tile_size],
//!   ...any other fields, carried through unchanged
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coords::genome_length;
use crate::error::{MultivecError, Result};
use crate::types::{ChromSize, TileShape};

/// Fields derived by the resolver; anything else in the document is kept in
/// [`TilesetInfo::extra`].
const DERIVED_FIELDS: &[&str] = &[
    "shape",
    "chromSizes",
    "resolutions",
    "tile_size",
    "max_width",
    "max_zoom",
    "min_pos",
    "max_pos",
];

/// Normalized metadata for one multivec dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilesetInfo {
    /// Output tile shape, `[tile_size, channels]` (stored shape reversed).
    pub shape: [usize; 2],
    /// Chromosomes in genome order.
    #[serde(rename = "chromSizes")]
    pub chrom_sizes: Vec<ChromSize>,
    /// Bin size in base pairs, indexed by zoom level.
    pub resolutions: Vec<u64>,
    /// Tile width in bins.
    pub tile_size: usize,
    /// Total genome length (end of the final chromosome).
    pub max_width: u64,
    pub max_zoom: u32,
    pub min_pos: [u64; 1],
    pub max_pos: [u64; 1],
    /// Remaining document fields (`multiscales`, `row_infos`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MultiscaleEntry {
    name: String,
    metadata: ChromMetadata,
}

#[derive(Debug, Deserialize)]
struct ChromMetadata {
    chromoffset: u64,
    chromsize: u64,
}

impl TilesetInfo {
    /// Decode and normalize a raw metadata document.
    pub fn from_document(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| MultivecError::metadata(format!("document is not valid JSON: {}", e)))?;

        match value {
            Value::Object(attrs) => Self::from_attributes(attrs),
            _ => Err(MultivecError::metadata("document is not a JSON object")),
        }
    }

    /// Normalize already-decoded document attributes.
    pub fn from_attributes(mut attrs: Map<String, Value>) -> Result<Self> {
        let multiscales: Vec<MultiscaleEntry> = attrs
            .get("multiscales")
            .cloned()
            .ok_or_else(|| MultivecError::metadata("missing field `multiscales`"))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| {
                    MultivecError::metadata(format!("invalid `multiscales`: {}", e))
                })
            })?;

        let final_chrom = multiscales
            .last()
            .ok_or_else(|| MultivecError::metadata("`multiscales` is empty"))?;
        let max_width = final_chrom.metadata.chromoffset + final_chrom.metadata.chromsize;

        let stored_shape = attrs
            .get("shape")
            .and_then(Value::as_array)
            .ok_or_else(|| MultivecError::metadata("missing field `shape`"))?;
        if stored_shape.len() != 2 {
            return Err(MultivecError::metadata(format!(
                "`shape` must have 2 dimensions, found {}",
                stored_shape.len()
            )));
        }
        let channels = dimension(&stored_shape[0])?;
        let tile_size = dimension(&stored_shape[1])?;
        if tile_size == 0 {
            return Err(MultivecError::metadata("tile size must be > 0"));
        }

        let resolutions = attrs
            .get("resolutions")
            .and_then(Value::as_array)
            .ok_or_else(|| MultivecError::metadata("missing field `resolutions`"))?
            .iter()
            .map(|v| {
                parse_resolution(v).ok_or_else(|| {
                    MultivecError::metadata(format!("invalid resolution {}", v))
                })
            })
            .collect::<Result<Vec<u64>>>()?;
        if resolutions.is_empty() {
            return Err(MultivecError::metadata("`resolutions` is empty"));
        }

        let chrom_sizes: Vec<ChromSize> = multiscales
            .iter()
            .map(|m| ChromSize::new(m.name.clone(), m.metadata.chromsize))
            .collect();

        let genome_length = genome_length(&chrom_sizes);
        if genome_length != max_width {
            tracing::warn!(
                genome_length,
                max_width,
                "Chromosome sizes do not sum to the final chromosome end"
            );
        }

        let max_zoom = ((max_width as f64) / (tile_size as f64))
            .log2()
            .ceil()
            .max(0.0) as u32;

        for field in DERIVED_FIELDS {
            attrs.remove(*field);
        }

        Ok(Self {
            shape: [tile_size, channels],
            chrom_sizes,
            resolutions,
            tile_size,
            max_width,
            max_zoom,
            min_pos: [0],
            max_pos: [max_width],
            extra: attrs,
        })
    }

    /// Number of signal channels (rows) per tile.
    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    /// Shape of the dense matrix assembled for each tile.
    pub fn output_shape(&self) -> TileShape {
        TileShape::new(self.channels(), self.tile_size)
    }

    /// Bin size for zoom level `zoom`.
    pub fn resolution_for_zoom(&self, zoom: u32) -> Result<u64> {
        self.resolutions
            .get(zoom as usize)
            .copied()
            .ok_or(MultivecError::ZoomOutOfRange {
                zoom,
                available: self.resolutions.len(),
            })
    }
}

fn dimension(value: &Value) -> Result<usize> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| MultivecError::metadata(format!("invalid shape dimension {}", value)))
}

/// Resolutions may be stored as integers, integral floats or numeric strings.
fn parse_resolution(value: &Value) -> Option<u64> {
    let resolution = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (resolution > 0).then_some(resolution)
}
