//! Signal generators for synthetic multivec data.
//!
//! Every generator returns `channels` rows of `bins` values. The patterns
//! are predictable so a test can tell exactly which bin of which chromosome
//! ended up in a tile column.

/// Creates rows where each value encodes its position.
///
/// Value at `(channel, bin)` is `base + channel * 1000 + bin`. Pass a
/// different `base` per chromosome to tell chromosomes apart.
///
/// # Example
///
/// ```
/// use test_utils::indexed_rows;
///
/// let rows = indexed_rows(2, 3, 10_000.0);
/// assert_eq!(rows[0], vec![10_000.0, 10_001.0, 10_002.0]);
/// assert_eq!(rows[1][2], 11_002.0);
/// ```
pub fn indexed_rows(channels: usize, bins: usize, base: f32) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|c| {
            (0..bins)
                .map(|b| base + (c * 1000) as f32 + b as f32)
                .collect()
        })
        .collect()
}

/// Same as [`indexed_rows`], flattened row-major.
pub fn indexed_data(channels: usize, bins: usize, base: f32) -> Vec<f32> {
    indexed_rows(channels, bins, base).concat()
}

/// Creates rows filled with a single value.
pub fn constant_rows(channels: usize, bins: usize, value: f32) -> Vec<Vec<f32>> {
    vec![vec![value; bins]; channels]
}

/// Creates a smooth coverage-like signal in `[0, amplitude]`.
///
/// Each channel is a phase-shifted sine wave; bins where the wave dips below
/// zero are clamped to exactly `0.0`, mimicking uncovered regions.
pub fn coverage_rows(channels: usize, bins: usize, amplitude: f32) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|c| {
            (0..bins)
                .map(|b| {
                    let phase = c as f32 * 0.7;
                    let v = (b as f32 * 0.3 + phase).sin() * amplitude;
                    v.max(0.0)
                })
                .collect()
        })
        .collect()
}

/// Creates rows where every `stride`-th bin is NaN (missing data).
pub fn rows_with_gaps(channels: usize, bins: usize, stride: usize) -> Vec<Vec<f32>> {
    let stride = stride.max(1);
    (0..channels)
        .map(|c| {
            (0..bins)
                .map(|b| {
                    if b % stride == 0 {
                        f32::NAN
                    } else {
                        (c + b) as f32
                    }
                })
                .collect()
        })
        .collect()
}
