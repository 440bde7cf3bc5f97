//! Chunk planning: which bins of which chromosome arrays make up a tile.

use crate::coords::genomic_range_to_chromosomes;
use crate::error::{MultivecError, Result};
use crate::types::{ChromSize, ChunkRequest};

/// One per-chromosome read and where its columns land in the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeChunkPlan {
    pub chrom: String,
    /// First bin to read, local to the chromosome.
    pub bin_start: u64,
    /// Bin after the last one to read.
    pub bin_end: u64,
    /// First output column filled by this chunk.
    pub column_offset: usize,
}

impl ChromosomeChunkPlan {
    /// Number of output columns reserved for this chunk.
    pub fn width(&self) -> usize {
        (self.bin_end - self.bin_start) as usize
    }

    /// Backend read covering this chunk at `resolution`.
    pub fn request(&self, resolution: u64) -> ChunkRequest {
        ChunkRequest {
            chrom: self.chrom.clone(),
            resolution,
            bin_start: self.bin_start,
            bin_end: self.bin_end,
        }
    }
}

/// Ordered chunk reads for one tile plus the zero padding on the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    pub chunks: Vec<ChromosomeChunkPlan>,
    pub tile_width: usize,
}

impl TilePlan {
    /// Columns covered by chunk reads.
    pub fn covered_width(&self) -> usize {
        self.chunks.iter().map(ChromosomeChunkPlan::width).sum()
    }

    /// Zero-filled columns after the last chunk.
    pub fn padding(&self) -> usize {
        self.tile_width - self.covered_width()
    }

    /// Backend reads for every planned chunk, in column order.
    pub fn requests(&self, resolution: u64) -> Vec<ChunkRequest> {
        self.chunks.iter().map(|c| c.request(resolution)).collect()
    }
}

/// Plan the per-chromosome reads for the absolute range
/// `[genomic_start, genomic_end)` at `bin_size` base pairs per bin.
///
/// Each touched chromosome contributes bins
/// `floor(local_start / bin_size) .. ceil(local_end / bin_size)`, clipped to
/// the chromosome's own bin count and to the columns still free in the tile.
/// Whatever is left once the genome runs out is right-hand padding, so
/// `covered_width() + padding() == tile_width` always holds.
pub fn plan_chunks(
    chrom_sizes: &[ChromSize],
    genomic_start: i64,
    genomic_end: i64,
    bin_size: u64,
    tile_width: usize,
) -> Result<TilePlan> {
    if bin_size == 0 {
        return Err(MultivecError::metadata("bin size must be > 0"));
    }

    let mut chunks = Vec::new();
    let mut remaining = tile_width as u64;
    let mut column_offset = 0usize;

    for segment in genomic_range_to_chromosomes(chrom_sizes, genomic_start, genomic_end) {
        if remaining == 0 {
            break;
        }

        let chrom_bins = chrom_sizes[segment.chrom_index].bin_count(bin_size);
        let bin_start = segment.start / bin_size;
        let bin_end = segment
            .end
            .div_ceil(bin_size)
            .min(chrom_bins)
            .min(bin_start + remaining);

        if bin_end <= bin_start {
            continue;
        }

        let plan = ChromosomeChunkPlan {
            chrom: segment.chrom,
            bin_start,
            bin_end,
            column_offset,
        };
        column_offset += plan.width();
        remaining -= bin_end - bin_start;
        chunks.push(plan);
    }

    Ok(TilePlan { chunks, tile_width })
}
