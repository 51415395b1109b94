//! Fixed-width block streams and stage records
//!
//! Blocks are the atomic transfer unit between pipeline stages: a tile's
//! value/index arrays are always consumed in whole blocks, zero-padded at the
//! tail. The record structs carry the same information as the original
//! hardware bit-packed stream words, as tagged fields.

use crate::partition::Tile;
use crate::util::i64_to_usize;

/// Lanes per block (512-bit burst / 32-bit lanes on the reference hardware).
pub const BLOCK_WIDTH: usize = 16;

/// Lane mask over one block; bit `j` selects lane `j`.
pub type LaneMask = u16;

pub type ValueBlock = [f64; BLOCK_WIDTH];
pub type IndexBlock = [i64; BLOCK_WIDTH];

/// One row's extent in the nonzero stream, derived from the row pointers.
/// The sequence is terminated by a sentinel with `is_last` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBoundary {
    pub row: usize,
    pub nnz: usize,
    pub is_last: bool,
}

/// Row-marker output: which lanes of the current product block belong to
/// `row`. `pull_block` tells the reducer to fetch the next product block
/// before applying the mask; `is_write` marks the row's final mark record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMark {
    pub row: usize,
    pub mask: LaneMask,
    pub is_write: bool,
    pub pull_block: bool,
    pub is_last: bool,
}

/// Masked-reduction output: one partial sum per mark record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPartial {
    pub row: usize,
    pub value: f64,
    pub is_write: bool,
    pub is_last: bool,
}

/// Finalized row record: the row's true sum is `value + prev_sum`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSum {
    pub row: usize,
    pub value: f64,
    pub prev_sum: f64,
    pub is_last: bool,
}

/// Build a contiguous lane mask selecting `start..=end`.
#[inline]
#[must_use]
pub fn lane_mask(start: usize, end: usize) -> LaneMask {
    debug_assert!(start <= end && end < BLOCK_WIDTH);
    let width = end - start + 1;
    let ones = if width == BLOCK_WIDTH { LaneMask::MAX } else { (1 << width) - 1 };
    ones << start
}

/// A tile's data re-laid-out as whole blocks, ready to stream.
///
/// `nnz_blocks` is the header the downstream stages use to know where the
/// tile's nonzero data ends; `row_bounds` carries one record per tile row
/// plus the terminating sentinel.
#[derive(Debug, Clone)]
pub struct TileStreams {
    pub nnz_blocks: usize,
    pub values: Vec<ValueBlock>,
    pub indices: Vec<IndexBlock>,
    pub row_bounds: Vec<RowBoundary>,
}

impl TileStreams {
    /// Pack one tile into block streams. The value and index arrays are
    /// padded to a whole block with zero lanes; padded index lanes point at
    /// column 0 and are never selected by any mask.
    #[must_use]
    pub fn build(tile: &Tile) -> Self {
        let nnz = tile.nnz();
        let nnz_blocks = nnz.div_ceil(BLOCK_WIDTH);

        let mut values = vec![[0.0f64; BLOCK_WIDTH]; nnz_blocks];
        let mut indices = vec![[0i64; BLOCK_WIDTH]; nnz_blocks];
        for p in 0..nnz {
            values[p / BLOCK_WIDTH][p % BLOCK_WIDTH] = tile.csr.data[p];
            indices[p / BLOCK_WIDTH][p % BLOCK_WIDTH] = tile.csr.indices[p];
        }

        let rows = tile.rows();
        let mut row_bounds = Vec::with_capacity(rows + 1);
        for r in 0..rows {
            let nnz_in_row = i64_to_usize(tile.csr.indptr[r + 1]) - i64_to_usize(tile.csr.indptr[r]);
            row_bounds.push(RowBoundary { row: r, nnz: nnz_in_row, is_last: false });
        }
        row_bounds.push(RowBoundary { row: rows, nnz: 0, is_last: true });

        Self { nnz_blocks, values, indices, row_bounds }
    }
}
