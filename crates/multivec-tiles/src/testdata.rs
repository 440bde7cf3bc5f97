//! Synthetic multivec stores on the local filesystem.
//!
//! Used by the integration tests and for trying the tile server without a
//! real dataset. A store written here has the same layout the Zarr backend
//! reads:
//!
//! | Key | Content |
//! |-----|---------|
//! | `.zattrs` | metadata document (`multiscales`, `resolutions`, `shape`, `row_infos`) |
//! | `chromosomes/{chrom}/{resolution}/` | `[channels, bins]` float32 array |

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::config::MultivecConfig;
use crate::coords::chromosome_offsets;
use crate::types::ChromSize;

/// Shape of a synthetic multivec dataset.
#[derive(Debug, Clone)]
pub struct MultivecLayout {
    pub chrom_sizes: Vec<ChromSize>,
    /// Bin sizes, indexed by zoom level.
    pub resolutions: Vec<u64>,
    pub channels: usize,
    /// Tile width in bins.
    pub tile_size: usize,
    /// Bins per stored chunk along the genome axis.
    pub chunk_bins: u64,
}

impl MultivecLayout {
    pub fn new(
        chrom_sizes: Vec<ChromSize>,
        resolutions: Vec<u64>,
        channels: usize,
        tile_size: usize,
    ) -> Self {
        Self {
            chrom_sizes,
            resolutions,
            channels,
            tile_size,
            chunk_bins: tile_size as u64,
        }
    }

    /// The metadata document describing this layout.
    pub fn attributes(&self) -> Map<String, Value> {
        let multiscales: Vec<Value> = self
            .chrom_sizes
            .iter()
            .zip(chromosome_offsets(&self.chrom_sizes))
            .map(|(chrom, offset)| {
                let datasets: Vec<Value> = self
                    .resolutions
                    .iter()
                    .map(|r| json!({ "path": r.to_string() }))
                    .collect();
                json!({
                    "name": chrom.name,
                    "datasets": datasets,
                    "type": "zarr-multivec",
                    "metadata": { "chromoffset": offset, "chromsize": chrom.size },
                })
            })
            .collect();

        let row_infos: Vec<Value> = (0..self.channels)
            .map(|c| json!(format!("row {}", c)))
            .collect();

        let mut attrs = Map::new();
        attrs.insert("multiscales".to_string(), Value::Array(multiscales));
        attrs.insert("resolutions".to_string(), json!(self.resolutions));
        attrs.insert("shape".to_string(), json!([self.channels, self.tile_size]));
        attrs.insert("row_infos".to_string(), Value::Array(row_infos));
        attrs
    }
}

/// Value at `(chromosome index, channel, bin)` = `chrom * 100_000 + channel * 1000 + bin`.
///
/// Lets a test tell which bin of which chromosome landed in a tile column.
pub fn indexed_signal(chrom_index: usize, channel: usize, bin: u64) -> f32 {
    (chrom_index * 100_000 + channel * 1000) as f32 + bin as f32
}

/// Write a full multivec store at `path`.
///
/// `signal(chrom_index, channel, bin)` supplies every stored value. Arrays go
/// where `config` expects them and the metadata document is written under
/// `config.metadata_key`.
pub fn write_multivec_store<F>(
    path: &Path,
    layout: &MultivecLayout,
    config: &MultivecConfig,
    signal: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Fn(usize, usize, u64) -> f32,
{
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);

    for (chrom_index, chrom) in layout.chrom_sizes.iter().enumerate() {
        for &resolution in &layout.resolutions {
            let bins = chrom.bin_count(resolution);
            let data: Vec<f32> = (0..layout.channels)
                .flat_map(|channel| (0..bins).map(move |bin| (channel, bin)))
                .map(|(channel, bin)| signal(chrom_index, channel, bin))
                .collect();

            write_chromosome_array(
                &store,
                &config.array_path(&chrom.name, resolution),
                layout.channels,
                bins,
                layout.chunk_bins,
                &data,
            )?;
        }
    }

    let document = serde_json::to_vec_pretty(&Value::Object(layout.attributes()))?;
    std::fs::write(path.join(&config.metadata_key), document)?;

    Ok(())
}

/// Write one `[channels, bins]` array of row-major `data` at `array_path`.
pub fn write_chromosome_array(
    store: &Arc<FilesystemStore>,
    array_path: &str,
    channels: usize,
    bins: u64,
    chunk_bins: u64,
    data: &[f32],
) -> Result<(), Box<dyn std::error::Error>> {
    let array = ArrayBuilder::new(
        vec![channels as u64, bins],
        DataType::Float32,
        vec![(channels as u64).max(1), chunk_bins.clamp(1, bins.max(1))].try_into()?,
        FillValue::from(0.0f32),
    )
    .build(store.clone(), array_path)?;

    array.store_metadata()?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![channels as u64, bins])?;
    array.store_array_subset_elements(&subset, data)?;

    Ok(())
}
