//! Tiled streaming SpMV driver
//!
//! Runs the partitioner's tile grid through the streaming pipeline and
//! scatters the per-partition sums back to global row order. Y-partitions
//! share no mutable state, so they run in parallel; within a partition the
//! x-tiles accumulate into one local result vector.

use crate::error::Result;
use crate::pipeline::compute_tile;
use crate::partition::Tile;
use log::debug;
use rayon::prelude::*;

/// Compute per-partition row sums for a full tile grid against `x`.
///
/// `tiles[i]` is Y-partition `i`'s row of x-tiles; `x` is the global input
/// vector, sliced per tile by its column range. The returned vectors are in
/// tile-local row order and must go through [`scatter`] with the
/// partitioner's `y_part_rows` to become a global result.
///
/// # Errors
///
/// Propagates the first tile's `Error::ProtocolViolation`; no partial
/// results are returned.
pub fn tiled_spmv(tiles: &[Vec<Tile>], x: &[f64]) -> Result<Vec<Vec<f64>>> {
    let part_sums = tiles
        .par_iter()
        .map(|part_tiles| -> Result<Vec<f64>> {
            let rows = part_tiles.first().map_or(0, Tile::rows);
            let mut acc = vec![0.0f64; rows];
            for tile in part_tiles {
                let sums = compute_tile(tile, &x[tile.col_start..tile.col_end])?;
                for (a, s) in acc.iter_mut().zip(&sums) {
                    *a += s;
                }
            }
            Ok(acc)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("computed {} partition result vectors", part_sums.len());
    Ok(part_sums)
}

/// Write per-partition sums back to global row order:
/// `out[y_part_rows[i][j]] = part_sums[i][j]`.
///
/// Partitions hold disjoint global rows, so every output element is written
/// at most once; repeating the scatter with the same inputs is a no-op.
pub fn scatter(part_sums: &[Vec<f64>], y_part_rows: &[Vec<usize>], out: &mut [f64]) {
    for (sums, rows) in part_sums.iter().zip(y_part_rows) {
        for (&v, &row) in sums.iter().zip(rows) {
            out[row] = v;
        }
    }
}

/// Full round trip: partitioned tiles -> streamed per-partition sums ->
/// scattered global y.
///
/// # Errors
///
/// See [`tiled_spmv`].
pub fn tiled_spmv_scattered(
    tiles: &[Vec<Tile>],
    y_part_rows: &[Vec<usize>],
    x: &[f64],
    nrows: usize,
) -> Result<Vec<f64>> {
    let part_sums = tiled_spmv(tiles, x)?;
    let mut y = vec![0.0f64; nrows];
    scatter(&part_sums, y_part_rows, &mut y);
    Ok(y)
}
