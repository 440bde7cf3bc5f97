//! Common test fixtures for multivec tests.
//!
//! Chromosome layouts and the `.zattrs` metadata document describing a
//! multivec store built from them.

use serde_json::{json, Value};

/// Chromosome layouts as `(name, size)` pairs in genome order.
pub mod chroms {
    /// Two chromosomes with a boundary at 1000.
    pub const TWO_CHROMS: &[(&str, u64)] = &[("chr1", 1000), ("chr2", 2000)];

    /// Three chromosomes; the last two are shorter than one resolution-100 tile.
    pub const THREE_CHROMS: &[(&str, u64)] = &[("chr1", 1000), ("chr2", 500), ("chr3", 250)];

    /// Sizes that are not multiples of any resolution.
    pub const RAGGED: &[(&str, u64)] = &[("chrA", 1234), ("chrB", 567), ("chrC", 89)];

    /// A single short chromosome.
    pub const SINGLE: &[(&str, u64)] = &[("chrM", 450)];
}

/// Store layout defaults shared by most tests.
pub mod layout {
    /// Bin sizes, indexed by zoom level.
    pub const RESOLUTIONS: &[u64] = &[100, 10];
    /// Tile width in bins.
    pub const TILE_SIZE: u64 = 10;
    /// Signal channels (rows) per tile.
    pub const CHANNELS: u64 = 2;
}

/// Number of bins covering `size` base pairs at `resolution`.
pub fn bin_count(size: u64, resolution: u64) -> u64 {
    size.div_ceil(resolution)
}

/// Genome start offset of every chromosome in `chroms`.
pub fn chrom_offsets(chroms: &[(&str, u64)]) -> Vec<u64> {
    chroms
        .iter()
        .scan(0u64, |offset, (_, size)| {
            let start = *offset;
            *offset += size;
            Some(start)
        })
        .collect()
}

/// Build a multivec metadata document for `chroms`.
///
/// The stored tile shape is `[channels, tile_size]`; one multiscale entry per
/// chromosome lists a dataset per resolution.
pub fn multivec_zattrs(
    chroms: &[(&str, u64)],
    resolutions: &[u64],
    channels: u64,
    tile_size: u64,
) -> Value {
    let multiscales: Vec<Value> = chroms
        .iter()
        .zip(chrom_offsets(chroms))
        .map(|((name, size), offset)| {
            let datasets: Vec<Value> = resolutions
                .iter()
                .map(|r| json!({ "path": r.to_string() }))
                .collect();
            json!({
                "name": name,
                "datasets": datasets,
                "type": "zarr-multivec",
                "metadata": { "chromoffset": offset, "chromsize": size },
            })
        })
        .collect();

    let row_infos: Vec<Value> = (0..channels).map(|c| json!(format!("row {}", c))).collect();

    json!({
        "multiscales": multiscales,
        "resolutions": resolutions,
        "shape": [channels, tile_size],
        "row_infos": row_infos,
    })
}

/// Metadata document for [`chroms::TWO_CHROMS`] with the default layout.
pub fn two_chrom_zattrs() -> Value {
    multivec_zattrs(
        chroms::TWO_CHROMS,
        layout::RESOLUTIONS,
        layout::CHANNELS,
        layout::TILE_SIZE,
    )
}
