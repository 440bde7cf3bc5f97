//! Assembly of per-chromosome chunks into one dense tile.
//!
//! Chunks are laid side by side along the width axis. Any column that no
//! chunk fills (a chunk shorter than its reserved width, or the padding past
//! the genome end) stays zero.

use crate::error::{MultivecError, Result};
use crate::planner::TilePlan;
use crate::types::{ChunkMatrix, TileExtrema, TileShape};

/// Dense, row-major `channels × width` tile data with its statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTile {
    pub shape: TileShape,
    pub data: Vec<f32>,
    pub extrema: TileExtrema,
}

impl AssembledTile {
    pub fn row(&self, channel: usize) -> &[f32] {
        let width = self.shape.width;
        &self.data[channel * width..(channel + 1) * width]
    }
}

/// Concatenate `chunks` left to right and zero-pad up to `shape.width`.
pub fn assemble(chunks: &[ChunkMatrix], shape: TileShape) -> Result<AssembledTile> {
    let mut offset = 0;
    let placements = chunks.iter().map(|chunk| {
        let placement = (offset, chunk.width(), chunk);
        offset += chunk.width();
        placement
    });
    assemble_placed(placements, shape)
}

/// Place each chunk at the column offset its plan reserved.
///
/// `chunks` must be in plan order. A chunk narrower than its planned width
/// leaves the rest of its columns zero; a wider one is a shape mismatch.
pub fn assemble_planned(
    plan: &TilePlan,
    chunks: &[ChunkMatrix],
    shape: TileShape,
) -> Result<AssembledTile> {
    if plan.chunks.len() != chunks.len() {
        return Err(MultivecError::shape_mismatch(format!(
            "plan has {} chunks but {} were read",
            plan.chunks.len(),
            chunks.len()
        )));
    }

    for (planned, chunk) in plan.chunks.iter().zip(chunks) {
        if chunk.width() > planned.width() {
            return Err(MultivecError::shape_mismatch(format!(
                "chunk for {}[{}..{}] has {} columns, planned {}",
                planned.chrom,
                planned.bin_start,
                planned.bin_end,
                chunk.width(),
                planned.width()
            )));
        }
    }

    let placements = plan
        .chunks
        .iter()
        .zip(chunks)
        .map(|(planned, chunk)| (planned.column_offset, planned.width(), chunk));
    assemble_placed(placements, shape)
}

fn assemble_placed<'a>(
    placements: impl Iterator<Item = (usize, usize, &'a ChunkMatrix)>,
    shape: TileShape,
) -> Result<AssembledTile> {
    let mut data = vec![0.0f32; shape.len()];

    for (offset, reserved, chunk) in placements {
        if chunk.channels() != shape.channels {
            return Err(MultivecError::shape_mismatch(format!(
                "chunk has {} channels, tile has {}",
                chunk.channels(),
                shape.channels
            )));
        }

        // Columns past the tile edge are dropped; the planner never produces
        // them, but plain concatenation of oversized input can.
        let columns = chunk.width().min(reserved);
        let end = (offset + columns).min(shape.width);
        if end <= offset {
            continue;
        }
        let columns = end - offset;

        for channel in 0..shape.channels {
            let out = channel * shape.width + offset;
            data[out..out + columns].copy_from_slice(&chunk.row(channel)[..columns]);
        }
    }

    let extrema = compute_extrema(&data, shape);
    Ok(AssembledTile {
        shape,
        data,
        extrema,
    })
}

/// Global, non-zero and per-row extrema of row-major tile data.
///
/// `min`/`max` follow plain min/max reduction: any NaN makes both NaN and
/// infinities take part like any other value. The non-zero extrema only
/// consider values with `|v| > 0` (so NaN never qualifies) and are `None`
/// when nothing qualifies.
pub fn compute_extrema(data: &[f32], shape: TileShape) -> TileExtrema {
    let (min, max) = if data.iter().any(|v| v.is_nan()) {
        (f32::NAN, f32::NAN)
    } else {
        data.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (if v < lo { v } else { lo }, if v > hi { v } else { hi })
        })
    };

    let non_zero = data.iter().copied().filter(|v| v.abs() > 0.0);
    let (min_non_zero, max_non_zero) = fold_option_extrema(non_zero);

    let mut row_min = Vec::with_capacity(shape.channels);
    let mut row_max = Vec::with_capacity(shape.channels);
    if shape.width > 0 {
        for row in data.chunks(shape.width).take(shape.channels) {
            let (lo, hi) = fold_option_extrema(row.iter().copied().filter(|v| v.is_finite()));
            row_min.push(lo);
            row_max.push(hi);
        }
    }
    row_min.resize(shape.channels, None);
    row_max.resize(shape.channels, None);

    TileExtrema {
        min,
        max,
        min_non_zero,
        max_non_zero,
        row_min,
        row_max,
    }
}

fn fold_option_extrema(values: impl Iterator<Item = f32>) -> (Option<f32>, Option<f32>) {
    values.fold((None, None), |(lo, hi), v| {
        (
            Some(lo.map_or(v, |lo: f32| if v < lo { v } else { lo })),
            Some(hi.map_or(v, |hi: f32| if v > hi { v } else { hi })),
        )
    })
}
