//! Reference CSR SpMV kernel
//!
//! Plain row-wise y = A @ x, used by callers (and the test suite) to verify
//! the tiled streaming pipeline against a direct computation.

use crate::util::i64_to_usize;
use rayon::prelude::*;
use rill_core::Csr;

/// Below these sizes rayon overhead dominates; compute sequentially.
const SMALL_DIM_LIMIT: usize = 2048;
const SMALL_NNZ_LIMIT: usize = 32 * 1024;

/// Target nnz per parallel row range.
const RANGE_NNZ_TARGET: usize = 128 * 1024;

#[inline]
fn spmv_row_f64_i64(a: &Csr<f64, i64>, x: &[f64], i: usize) -> f64 {
    let s = i64_to_usize(a.indptr[i]);
    let e = i64_to_usize(a.indptr[i + 1]);
    let mut acc = 0.0f64;
    for p in s..e {
        let j = i64_to_usize(a.indices[p]);
        acc = a.data[p].mul_add(x[j], acc);
    }
    acc
}

/// y = A @ x
#[must_use]
pub fn spmv_f64_i64(a: &Csr<f64, i64>, x: &[f64]) -> Vec<f64> {
    assert_eq!(x.len(), a.ncols, "x length must equal ncols");
    let nrows = a.nrows;
    let nnz = a.data.len();
    let mut y = vec![0.0f64; nrows];

    let small = nrows <= SMALL_DIM_LIMIT || nnz <= SMALL_NNZ_LIMIT;
    if small {
        for (i, yi) in y.iter_mut().enumerate().take(nrows) {
            *yi = spmv_row_f64_i64(a, x, i);
        }
        return y;
    }

    // Split rows into ranges of roughly equal nnz so skewed matrices still
    // balance across threads.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut acc = 0usize;
    let mut r0 = 0usize;
    for i in 0..nrows {
        let row_nnz = i64_to_usize(a.indptr[i + 1]) - i64_to_usize(a.indptr[i]);
        if acc == 0 {
            r0 = i;
        }
        acc += row_nnz;
        if acc >= RANGE_NNZ_TARGET {
            ranges.push((r0, i + 1));
            acc = 0;
        }
    }
    if acc > 0 {
        ranges.push((r0, nrows));
    }

    let y_addr = y.as_mut_ptr() as usize;
    ranges.into_par_iter().for_each(|(r0, r1)| {
        // Ranges are disjoint, so the raw writes never alias.
        let y_ptr = y_addr as *mut f64;
        for i in r0..r1 {
            let val = spmv_row_f64_i64(a, x, i);
            unsafe {
                *y_ptr.add(i) = val;
            }
        }
    });
    y
}
