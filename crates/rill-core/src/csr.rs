//! CSR format definitions and constructors

#[derive(Debug, Clone)]
pub struct Csr<T, I> {
    pub nrows: usize,
    pub ncols: usize,
    pub indptr: Vec<I>,
    pub indices: Vec<I>,
    pub data: Vec<T>,
}

impl<T, I> Csr<T, I> {
    #[inline]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }
}

impl Csr<f64, i64> {
    /// Build a CSR matrix from raw parts, validating the prefix-sum and
    /// index invariants when `check` is set.
    ///
    /// Column order within a row is deliberately not enforced: tile
    /// construction emits rows in column-partition order, which is legal
    /// CSR but not column-sorted.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<i64>,
        indices: Vec<i64>,
        data: Vec<f64>,
        check: bool,
    ) -> Result<Self, String> {
        if indptr.len() != nrows + 1 {
            return Err("indptr length must be nrows + 1".into());
        }
        if indices.len() != data.len() {
            return Err("indices and data must have equal length".into());
        }
        let nnz = indices.len();
        if indptr.last().copied().unwrap_or(0) != nnz as i64 {
            return Err("indptr last element must equal nnz".into());
        }
        if indptr.first().copied().unwrap_or(0) != 0 {
            return Err("indptr first element must be 0".into());
        }
        if check {
            for w in indptr.windows(2) {
                if w[0] > w[1] {
                    return Err("indptr must be non-decreasing".into());
                }
                if w[0] < 0 || w[1] < 0 {
                    return Err("indptr must be non-negative".into());
                }
            }
            for &j in &indices {
                if j < 0 || j as usize >= ncols {
                    return Err("column index out of bounds".into());
                }
            }
        }
        Ok(Self { nrows, ncols, indptr, indices, data })
    }

    #[inline]
    #[must_use]
    pub const fn from_parts_unchecked(
        nrows: usize,
        ncols: usize,
        indptr: Vec<i64>,
        indices: Vec<i64>,
        data: Vec<f64>,
    ) -> Self {
        Self { nrows, ncols, indptr, indices, data }
    }

    /// Nonzero count of row `i`.
    #[inline]
    #[must_use]
    pub fn row_nnz(&self, i: usize) -> usize {
        (self.indptr[i + 1] - self.indptr[i]) as usize
    }
}
