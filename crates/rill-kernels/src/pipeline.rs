//! Streaming block-segmented SpMV pipeline
//!
//! Computes one scalar per row of a tile from block-streamed nonzeros, with
//! no random access to the nonzero data. Four stages run concurrently over
//! bounded in-order channels:
//!
//! multiplier -> row marker -> masked reducer -> carry accumulator -> writer
//!
//! The multiplier is purely lane-wise; the row marker translates row extents
//! into lane masks over product blocks; the masked reducer folds each masked
//! block to a scalar partial; the carry accumulator stitches partials of rows
//! that span block boundaries back together through a short delay line. All
//! stages process records in strict row/block order — the carry logic is only
//! correct because nothing completes out of order.

use crate::block::{
    lane_mask, IndexBlock, LaneMask, RowBoundary, RowMark, RowPartial, RowSum, TileStreams,
    ValueBlock, BLOCK_WIDTH,
};
use crate::error::{Error, Result};
use crate::partition::Tile;
use crate::util::i64_to_usize;
use log::trace;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;
use wide::f64x4;

/// Bounded channel capacity between stages. Affects throughput only; the
/// carry logic does not depend on it.
const CHANNEL_DEPTH: usize = 16;

/// Delay-line slots in the carry accumulator, matching the reference
/// hardware's reduction latency. Any depth >= 2 is correct here (the oldest
/// slot folds back into the newest), so the floor is a compile-time
/// invariant rather than a tunable.
const DELAY_SLOTS: usize = 5;
const _: () = assert!(DELAY_SLOTS >= 2, "carry delay line needs at least two slots");

fn recv_err(stage: &'static str) -> Error {
    Error::protocol(stage, "upstream channel closed before sentinel")
}

fn send_err(stage: &'static str) -> Error {
    Error::protocol(stage, "downstream channel closed")
}

/// Lane-wise multiply of value blocks against the resident x slice. No row
/// awareness.
fn multiplier(
    values: &Receiver<ValueBlock>,
    indices: &Receiver<IndexBlock>,
    x_slice: &[f64],
    out: &SyncSender<ValueBlock>,
    nnz_blocks: usize,
) -> Result<()> {
    for _ in 0..nnz_blocks {
        let vals = values.recv().map_err(|_| recv_err("multiplier"))?;
        let cols = indices.recv().map_err(|_| recv_err("multiplier"))?;
        let mut prod = [0.0f64; BLOCK_WIDTH];
        for j in 0..BLOCK_WIDTH {
            // Padded lanes carry value 0 and index 0, so they contribute
            // nothing even though they are multiplied.
            prod[j] = vals[j] * x_slice[i64_to_usize(cols[j])];
        }
        out.send(prod).map_err(|_| send_err("multiplier"))?;
    }
    Ok(())
}

/// Translate row boundaries into lane masks over the (unseen) product block
/// stream. Keeps a cursor into the current block; a row longer than the
/// remaining lanes produces one mark per spanned block, and only the final
/// mark carries `is_write`.
fn row_marker(bounds: &Receiver<RowBoundary>, out: &SyncSender<RowMark>) -> Result<()> {
    let mut cursor = BLOCK_WIDTH; // first nonzero lane forces a block pull
    loop {
        let rb = bounds.recv().map_err(|_| recv_err("row_marker"))?;
        if rb.is_last {
            out.send(RowMark {
                row: rb.row,
                mask: 0,
                is_write: false,
                pull_block: false,
                is_last: true,
            })
            .map_err(|_| send_err("row_marker"))?;
            return Ok(());
        }
        if rb.nnz == 0 {
            // An empty row still gets exactly one finalized (zero) sum.
            out.send(RowMark {
                row: rb.row,
                mask: 0,
                is_write: true,
                pull_block: false,
                is_last: false,
            })
            .map_err(|_| send_err("row_marker"))?;
            continue;
        }
        let mut remaining = rb.nnz;
        while remaining > 0 {
            let pull = cursor >= BLOCK_WIDTH;
            if pull {
                cursor = 0;
            }
            let start = cursor;
            let last_lane = start + remaining - 1;
            let is_write = last_lane < BLOCK_WIDTH;
            let end = last_lane.min(BLOCK_WIDTH - 1);
            out.send(RowMark {
                row: rb.row,
                mask: lane_mask(start, end),
                is_write,
                pull_block: pull,
                is_last: false,
            })
            .map_err(|_| send_err("row_marker"))?;
            let consumed = end - start + 1;
            remaining -= consumed;
            cursor = start + consumed;
        }
    }
}

#[inline]
fn masked_sum(block: &ValueBlock, mask: LaneMask) -> f64 {
    let mut accv = f64x4::from([0.0, 0.0, 0.0, 0.0]);
    for c in (0..BLOCK_WIDTH).step_by(4) {
        let v = f64x4::from([
            if mask & (1u16 << c) != 0 { block[c] } else { 0.0 },
            if mask & (1u16 << (c + 1)) != 0 { block[c + 1] } else { 0.0 },
            if mask & (1u16 << (c + 2)) != 0 { block[c + 2] } else { 0.0 },
            if mask & (1u16 << (c + 3)) != 0 { block[c + 3] } else { 0.0 },
        ]);
        accv += v;
    }
    let arr = accv.to_array();
    arr[0] + arr[1] + arr[2] + arr[3]
}

/// Horizontal reduction of mask-selected lanes. Pulls the next product block
/// when the marker says the cursor wrapped.
fn masked_reducer(
    marks: &Receiver<RowMark>,
    products: &Receiver<ValueBlock>,
    out: &SyncSender<RowPartial>,
) -> Result<()> {
    let mut block = [0.0f64; BLOCK_WIDTH];
    let mut have_block = false;
    loop {
        let mark = marks.recv().map_err(|_| recv_err("masked_reducer"))?;
        if mark.is_last {
            out.send(RowPartial { row: mark.row, value: 0.0, is_write: false, is_last: true })
                .map_err(|_| send_err("masked_reducer"))?;
            return Ok(());
        }
        if mark.pull_block {
            block = products
                .recv()
                .map_err(|_| Error::protocol("masked_reducer", "block pull with no pending product block"))?;
            have_block = true;
        }
        if mark.mask != 0 && !have_block {
            return Err(Error::protocol("masked_reducer", "nonzero mask before any product block"));
        }
        out.send(RowPartial {
            row: mark.row,
            value: masked_sum(&block, mark.mask),
            is_write: mark.is_write,
            is_last: false,
        })
        .map_err(|_| send_err("masked_reducer"))?;
    }
}

/// Stitch partial sums of block-spanning rows back together.
///
/// The delay line holds the still-pending partials of the current row. On a
/// finalizing record the line's contents become the carried prefix and the
/// line resets, so a completed row can never leak into the next row's carry.
/// The oldest slot folds back into the newest when it would fall off, which
/// keeps rows spanning more than `DELAY_SLOTS` blocks exact.
fn carry_accumulator(partials: &Receiver<RowPartial>, out: &SyncSender<RowSum>) -> Result<()> {
    let mut delay = [0.0f64; DELAY_SLOTS];
    loop {
        let p = partials.recv().map_err(|_| recv_err("carry_accumulator"))?;
        if p.is_last {
            out.send(RowSum { row: p.row, value: 0.0, prev_sum: 0.0, is_last: true })
                .map_err(|_| send_err("carry_accumulator"))?;
            return Ok(());
        }
        let mut prev_sum = 0.0f64;
        for k in 1..DELAY_SLOTS {
            prev_sum += delay[k];
        }
        for k in 0..DELAY_SLOTS - 1 {
            delay[k] = if p.is_write { 0.0 } else { delay[k + 1] };
        }
        if p.is_write {
            out.send(RowSum { row: p.row, value: p.value, prev_sum, is_last: false })
                .map_err(|_| send_err("carry_accumulator"))?;
        }
        let held = if p.is_write { 0.0 } else { p.value };
        delay[DELAY_SLOTS - 1] = delay[0] + held;
    }
}

/// Feed value/index blocks in lockstep pairs so the bounded channels cannot
/// wedge against the multiplier's alternating reads.
fn feed_nonzeros(
    values: Vec<ValueBlock>,
    indices: Vec<IndexBlock>,
    val_tx: &SyncSender<ValueBlock>,
    idx_tx: &SyncSender<IndexBlock>,
) -> Result<()> {
    for (v, i) in values.into_iter().zip(indices) {
        val_tx.send(v).map_err(|_| send_err("feed_nonzeros"))?;
        idx_tx.send(i).map_err(|_| send_err("feed_nonzeros"))?;
    }
    Ok(())
}

fn feed_row_bounds(bounds: Vec<RowBoundary>, tx: &SyncSender<RowBoundary>) -> Result<()> {
    for rb in bounds {
        tx.send(rb).map_err(|_| send_err("feed_row_bounds"))?;
    }
    Ok(())
}

fn join_stage(handle: thread::ScopedJoinHandle<'_, Result<()>>, stage: &'static str) -> Result<()> {
    handle
        .join()
        .map_err(|_| Error::protocol(stage, "stage panicked"))?
}

/// Pick the most informative failure: a stage's own violation over the
/// secondary channel-closed reports the rest of the graph unwinds with.
fn first_stage_error(results: Vec<Result<()>>) -> Option<Error> {
    let mut fallback = None;
    for r in results {
        if let Err(e) = r {
            let secondary = matches!(
                &e,
                Error::ProtocolViolation { detail, .. } if detail.contains("channel closed")
            );
            if secondary {
                if fallback.is_none() {
                    fallback = Some(e);
                }
            } else {
                return Some(e);
            }
        }
    }
    fallback
}

/// Compute per-row sums for one tile from its block streams.
///
/// `x_slice` must cover the tile's column range (`tile.col_start ..
/// tile.col_end` of the global x vector); it is copied into the multiplier
/// and held resident for the tile's lifetime.
///
/// # Errors
///
/// `Error::ProtocolViolation` if any stage observes records out of sequence;
/// the tile's computation is aborted and no partial result is returned.
/// Empty tiles yield all-zero sums without spawning the stage graph.
pub fn compute_tile(tile: &Tile, x_slice: &[f64]) -> Result<Vec<f64>> {
    assert_eq!(x_slice.len(), tile.cols(), "x slice length must equal tile cols");
    let rows = tile.rows();
    if tile.is_empty() {
        return Ok(vec![0.0f64; rows]);
    }

    let TileStreams { nnz_blocks, values, indices, row_bounds } = TileStreams::build(tile);
    trace!(
        "tile ({},{}): rows {rows}, nnz {}, nnz_blocks {nnz_blocks}",
        tile.y_part,
        tile.x_part,
        tile.nnz()
    );
    let x: Vec<f64> = x_slice.to_vec();

    thread::scope(|s| {
        let (val_tx, val_rx) = sync_channel::<ValueBlock>(CHANNEL_DEPTH);
        let (idx_tx, idx_rx) = sync_channel::<IndexBlock>(CHANNEL_DEPTH);
        let (bnd_tx, bnd_rx) = sync_channel::<RowBoundary>(CHANNEL_DEPTH);
        let (prod_tx, prod_rx) = sync_channel::<ValueBlock>(CHANNEL_DEPTH);
        let (mark_tx, mark_rx) = sync_channel::<RowMark>(CHANNEL_DEPTH);
        let (part_tx, part_rx) = sync_channel::<RowPartial>(CHANNEL_DEPTH);
        let (sum_tx, sum_rx) = sync_channel::<RowSum>(CHANNEL_DEPTH);

        let h_feed = s.spawn(move || feed_nonzeros(values, indices, &val_tx, &idx_tx));
        let h_bounds = s.spawn(move || feed_row_bounds(row_bounds, &bnd_tx));
        let xs = &x;
        let h_mult = s.spawn(move || multiplier(&val_rx, &idx_rx, xs, &prod_tx, nnz_blocks));
        let h_mark = s.spawn(move || row_marker(&bnd_rx, &mark_tx));
        let h_reduce = s.spawn(move || masked_reducer(&mark_rx, &prod_rx, &part_tx));
        let h_accum = s.spawn(move || carry_accumulator(&part_rx, &sum_tx));

        // Writer: runs on the calling thread. A row may finalize more than
        // once if it spans several reduction cycles, hence accumulate.
        let mut result = vec![0.0f64; rows];
        let mut writer_err: Option<Error> = None;
        loop {
            match sum_rx.recv() {
                Ok(rs) if rs.is_last => break,
                Ok(rs) => {
                    if rs.row >= rows {
                        writer_err =
                            Some(Error::protocol("writer", format!("row {} out of range", rs.row)));
                        break;
                    }
                    result[rs.row] += rs.value + rs.prev_sum;
                }
                Err(_) => break, // a stage failed; its join reports why
            }
        }
        drop(sum_rx);

        let stage_results = vec![
            join_stage(h_feed, "feed_nonzeros"),
            join_stage(h_bounds, "feed_row_bounds"),
            join_stage(h_mult, "multiplier"),
            join_stage(h_mark, "row_marker"),
            join_stage(h_reduce, "masked_reducer"),
            join_stage(h_accum, "carry_accumulator"),
        ];
        // A writer-side violation shuts the graph down, so the stages also
        // report channel closes; the writer's error is the primary one.
        if let Some(e) = writer_err {
            return Err(e);
        }
        if let Some(e) = first_stage_error(stage_results) {
            return Err(e);
        }
        Ok(result)
    })
}
