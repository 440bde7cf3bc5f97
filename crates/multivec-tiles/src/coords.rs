//! Mapping from the concatenated genome axis to per-chromosome coordinates.

use crate::types::ChromSize;

/// Part of an absolute range that lies inside a single chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeSegment {
    pub chrom: String,
    /// Position of the chromosome in genome order.
    pub chrom_index: usize,
    /// Start relative to the chromosome start (base pairs).
    pub start: u64,
    /// End relative to the chromosome start (base pairs, exclusive).
    pub end: u64,
}

/// Sum of all chromosome sizes.
pub fn genome_length(chrom_sizes: &[ChromSize]) -> u64 {
    chrom_sizes.iter().map(|c| c.size).sum()
}

/// Split the absolute range `[abs_start, abs_end)` at every chromosome
/// boundary it crosses.
///
/// `abs_start` is clipped to 0 and `abs_end` to the genome length. Segments
/// come back in genome order and are never empty, so a range ending exactly
/// on a boundary does not produce a zero-length segment for the next
/// chromosome.
pub fn genomic_range_to_chromosomes(
    chrom_sizes: &[ChromSize],
    abs_start: i64,
    abs_end: i64,
) -> Vec<ChromosomeSegment> {
    let upper = i64::try_from(genome_length(chrom_sizes)).unwrap_or(i64::MAX);

    let start = abs_start.clamp(0, upper) as u64;
    let end = abs_end.clamp(0, upper) as u64;

    let mut segments = Vec::new();
    if start >= end {
        return segments;
    }

    let mut offset = 0u64;
    for (chrom_index, chrom) in chrom_sizes.iter().enumerate() {
        let chrom_end = offset + chrom.size;

        if chrom_end > start && offset < end {
            let local_start = start.max(offset) - offset;
            let local_end = end.min(chrom_end) - offset;
            if local_start < local_end {
                segments.push(ChromosomeSegment {
                    chrom: chrom.name.clone(),
                    chrom_index,
                    start: local_start,
                    end: local_end,
                });
            }
        }

        if chrom_end >= end {
            break;
        }
        offset = chrom_end;
    }

    segments
}

/// Absolute start offset of every chromosome, in genome order.
pub fn chromosome_offsets(chrom_sizes: &[ChromSize]) -> Vec<u64> {
    chrom_sizes
        .iter()
        .scan(0u64, |offset, chrom| {
            let start = *offset;
            *offset += chrom.size;
            Some(start)
        })
        .collect()
}
