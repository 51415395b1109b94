//! Tile partitioner
//!
//! Splits one CSR matrix into a 2-D grid of row-balanced, column-bounded CSR
//! tiles sized for fixed-capacity compute units. Rows are distributed across
//! Y-partitions by nonzero count (ascending stable sort + boustrophedon
//! sweep), each Y-partition is rebuilt as a row-localized CSC, and contiguous
//! column ranges of that CSC become CSR tiles. The returned `y_part_rows`
//! permutation maps each tile-local row back to its original global row and
//! is required to scatter per-tile results (see `tiled::scatter`).

use crate::error::{Error, Result};
use crate::util::{i64_to_usize, usize_to_i64};
use log::debug;
use rill_core::{Csc, Csr};

/// Hardware tile bounds: the largest row/column extent one compute unit can
/// hold resident.
#[derive(Debug, Clone, Copy)]
pub struct PartitionConfig {
    pub max_tile_rows: usize,
    pub max_tile_cols: usize,
}

impl PartitionConfig {
    /// Square tile bound, the common accelerator shape.
    #[must_use]
    pub const fn square(side: usize) -> Self {
        Self { max_tile_rows: side, max_tile_cols: side }
    }
}

/// One CSR tile: the intersection of a Y-partition (rows, localized) and an
/// X-partition (columns `col_start..col_end`, localized).
#[derive(Debug, Clone)]
pub struct Tile {
    pub csr: Csr<f64, i64>,
    pub y_part: usize,
    pub x_part: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Tile {
    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.csr.nrows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.csr.ncols
    }

    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// Zero rows, columns, or nonzeros. Legal; the pipeline treats such a
    /// tile as an immediately-empty stream.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.csr.nrows == 0 || self.csr.ncols == 0 || self.csr.nnz() == 0
    }
}

/// Check the CSR invariants the partitioner depends on. Matrices may arrive
/// via `from_parts_unchecked`, so this runs before any tile work.
pub fn validate_matrix(a: &Csr<f64, i64>) -> Result<()> {
    if a.indptr.len() != a.nrows + 1 {
        return Err(Error::MalformedMatrix(format!(
            "indptr length {} != nrows + 1 = {}",
            a.indptr.len(),
            a.nrows + 1
        )));
    }
    if a.indptr.first().copied().unwrap_or(0) != 0 {
        return Err(Error::MalformedMatrix("indptr must start at 0".into()));
    }
    if a.indptr.last().copied().unwrap_or(0) != usize_to_i64(a.nnz()) {
        return Err(Error::MalformedMatrix(format!(
            "indptr last element {} != nnz {}",
            a.indptr.last().copied().unwrap_or(0),
            a.nnz()
        )));
    }
    for w in a.indptr.windows(2) {
        if w[0] > w[1] {
            return Err(Error::MalformedMatrix("indptr must be non-decreasing".into()));
        }
    }
    for &j in &a.indices {
        if j < 0 || i64_to_usize(j.max(0)) >= a.ncols {
            return Err(Error::MalformedMatrix(format!("column index {j} out of bounds")));
        }
    }
    Ok(())
}

/// Partition `a` into `y_parts` x `x_parts` tiles with nnz-balanced rows.
///
/// Returns the tile grid and, per Y-partition, the original global row id of
/// each local row, in local-row order.
///
/// # Errors
///
/// `Error::Configuration` if a partition count is zero or the implied
/// partition extent exceeds the tile bound; `Error::MalformedMatrix` if the
/// CSR invariants do not hold. Empty partitions produce zero-sized tiles,
/// not errors.
pub fn partition_balanced(
    a: &Csr<f64, i64>,
    y_parts: usize,
    x_parts: usize,
    cfg: &PartitionConfig,
) -> Result<(Vec<Vec<Tile>>, Vec<Vec<usize>>)> {
    validate_matrix(a)?;

    if y_parts == 0 {
        return Err(Error::Configuration("y_parts must be at least 1".into()));
    }
    if x_parts == 0 {
        return Err(Error::Configuration("x_parts must be at least 1".into()));
    }

    let rows = a.nrows;
    let cols = a.ncols;
    let y_size = rows.div_ceil(y_parts.max(1));
    if y_size > cfg.max_tile_rows {
        return Err(Error::Configuration(format!(
            "tile bound {} cannot accommodate y-partition size {y_size}",
            cfg.max_tile_rows
        )));
    }
    let x_size = cols.div_ceil(x_parts.max(1));
    if x_size > cfg.max_tile_cols {
        return Err(Error::Configuration(format!(
            "tile bound {} cannot accommodate x-partition size {x_size}",
            cfg.max_tile_cols
        )));
    }

    // (nnz, row) pairs, stably sorted ascending by nnz. Ties keep original
    // row order; downstream bookkeeping depends on this exact output.
    let mut by_nnz: Vec<(usize, usize)> = (0..rows).map(|i| (a.row_nnz(i), i)).collect();
    by_nnz.sort_by_key(|&(nnz, _)| nnz);

    // Boustrophedon sweep: chunks of y_parts sorted rows, alternating bucket
    // direction, so partial sums stay within one row's nnz of each other.
    let mut y_part_rows: Vec<Vec<usize>> = vec![Vec::new(); y_parts];
    let mut y_part_nnz: Vec<usize> = vec![0; y_parts];
    let mut forward = true;
    let mut base = 0usize;
    while base < rows {
        let take = y_parts.min(rows - base);
        for (k, &(nnz, row)) in by_nnz[base..base + take].iter().enumerate() {
            let bucket = if forward { k } else { y_parts - 1 - k };
            y_part_nnz[bucket] += nnz;
            y_part_rows[bucket].push(row);
        }
        base += y_parts;
        forward = !forward;
    }

    let mut tiles: Vec<Vec<Tile>> = Vec::with_capacity(y_parts);
    for (i, bucket_rows) in y_part_rows.iter().enumerate() {
        let csc = bucket_to_csc(a, bucket_rows, y_part_nnz[i], cols);

        let mut part_tiles = Vec::with_capacity(x_parts);
        for j in 0..x_parts {
            let col_start = (j * x_size).min(cols);
            let col_end = ((j + 1) * x_size).min(cols);
            part_tiles.push(Tile {
                csr: csc_slice_to_csr(&csc, col_start, col_end),
                y_part: i,
                x_part: j,
                col_start,
                col_end,
            });
        }
        tiles.push(part_tiles);
    }

    debug!(
        "partitioned {rows}x{cols} (nnz {}) into {y_parts}x{x_parts} tiles, part nnz {:?}",
        a.nnz(),
        y_part_nnz
    );

    Ok((tiles, y_part_rows))
}

/// Rebuild one Y-partition as a CSC with row indices localized to the
/// bucket's assignment order: count per column, prefix-sum, scatter behind a
/// cursor array.
fn bucket_to_csc(
    a: &Csr<f64, i64>,
    bucket_rows: &[usize],
    bucket_nnz: usize,
    cols: usize,
) -> Csc<f64, i64> {
    let mut col_ptr = vec![0i64; cols + 1];
    for &row in bucket_rows {
        let s = i64_to_usize(a.indptr[row]);
        let e = i64_to_usize(a.indptr[row + 1]);
        for p in s..e {
            col_ptr[i64_to_usize(a.indices[p]) + 1] += 1;
        }
    }
    for j in 0..cols {
        col_ptr[j + 1] += col_ptr[j];
    }

    let mut row_indices = vec![0i64; bucket_nnz];
    let mut data = vec![0.0f64; bucket_nnz];
    let mut next: Vec<i64> = col_ptr[..cols].to_vec();
    for (local, &row) in bucket_rows.iter().enumerate() {
        let s = i64_to_usize(a.indptr[row]);
        let e = i64_to_usize(a.indptr[row + 1]);
        for p in s..e {
            let col = i64_to_usize(a.indices[p]);
            let dst = i64_to_usize(next[col]);
            next[col] += 1;
            row_indices[dst] = usize_to_i64(local);
            data[dst] = a.data[p];
        }
    }

    Csc::from_parts_unchecked(bucket_rows.len(), cols, col_ptr, row_indices, data)
}

/// Convert a contiguous column range of a bucket CSC back to a CSR tile with
/// localized column indices. Same counting/prefix-sum/scatter shape as
/// `bucket_to_csc`, counting by row this time.
fn csc_slice_to_csr(csc: &Csc<f64, i64>, col_start: usize, col_end: usize) -> Csr<f64, i64> {
    let tile_rows = csc.nrows;
    let tile_cols = col_end.saturating_sub(col_start);
    let first = i64_to_usize(csc.indptr[col_start]);
    let last = i64_to_usize(csc.indptr[col_end]);
    let tile_nnz = last - first;

    let mut row_ptr = vec![0i64; tile_rows + 1];
    for p in first..last {
        row_ptr[i64_to_usize(csc.indices[p]) + 1] += 1;
    }
    for r in 0..tile_rows {
        row_ptr[r + 1] += row_ptr[r];
    }

    let mut col_indices = vec![0i64; tile_nnz];
    let mut data = vec![0.0f64; tile_nnz];
    let mut next: Vec<i64> = row_ptr[..tile_rows].to_vec();
    for k in col_start..col_end {
        let s = i64_to_usize(csc.indptr[k]);
        let e = i64_to_usize(csc.indptr[k + 1]);
        for p in s..e {
            let row = i64_to_usize(csc.indices[p]);
            let dst = i64_to_usize(next[row]);
            next[row] += 1;
            col_indices[dst] = usize_to_i64(k - col_start);
            data[dst] = csc.data[p];
        }
    }

    Csr::from_parts_unchecked(tile_rows, tile_cols, row_ptr, col_indices, data)
}
