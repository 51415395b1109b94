//! CSC format definitions and constructors

#[derive(Debug, Clone)]
pub struct Csc<T, I> {
    pub nrows: usize,
    pub ncols: usize,
    pub indptr: Vec<I>,  // column pointer, length ncols + 1
    pub indices: Vec<I>, // row indices per column
    pub data: Vec<T>,
}

impl<T, I> Csc<T, I> {
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

impl Csc<f64, i64> {
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<i64>,
        indices: Vec<i64>,
        data: Vec<f64>,
        check: bool,
    ) -> Result<Self, String> {
        if indptr.len() != ncols + 1 {
            return Err("indptr length must be ncols + 1".into());
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
            for &i in &indices {
                if i < 0 || i as usize >= nrows {
                    return Err("row index out of bounds".into());
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

    /// Nonzero count of column `j`.
    #[inline]
    #[must_use]
    pub fn col_nnz(&self, j: usize) -> usize {
        (self.indptr[j + 1] - self.indptr[j]) as usize
    }
}
