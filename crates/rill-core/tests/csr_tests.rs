use rill_core::{Csc, Csr};

#[test]
fn from_parts_ok() {
    let nrows = 2usize;
    let ncols = 3usize;
    let indptr = vec![0i64, 2, 3];
    let indices = vec![0i64, 2, 1];
    let data = vec![1.0f64, 2.0, 3.0];
    let csr = Csr::from_parts(nrows, ncols, indptr, indices, data, true).unwrap();
    assert_eq!(csr.nnz(), 3);
    assert_eq!(csr.shape(), (2, 3));
    assert_eq!(csr.row_nnz(0), 2);
    assert_eq!(csr.row_nnz(1), 1);
}

#[test]
fn unsorted_columns_are_accepted() {
    // Tiles emit rows in column-partition order, so in-row column order is
    // legal CSR here.
    let indptr = vec![0i64, 3];
    let indices = vec![2i64, 0, 1];
    let data = vec![1.0f64, 2.0, 3.0];
    let csr = Csr::from_parts(1, 3, indptr, indices, data, true).unwrap();
    assert_eq!(csr.nnz(), 3);
}

#[test]
fn indptr_first_must_be_zero() {
    let indptr = vec![1i64, 1];
    let indices = vec![0i64];
    let data = vec![1.0f64];
    let err = Csr::from_parts(1, 3, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("must be 0"));
}

#[test]
fn nnz_and_lengths_must_match() {
    let indptr = vec![0i64, 2];
    let indices = vec![0i64, 1];
    let data = vec![1.0f64];
    let err = Csr::from_parts(1, 3, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("indices and data"));
}

#[test]
fn last_element_must_equal_nnz() {
    let indptr = vec![0i64, 1];
    let indices = vec![0i64, 1];
    let data = vec![1.0f64, 2.0];
    let err = Csr::from_parts(1, 3, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("last element"));
}

#[test]
fn indptr_must_be_non_decreasing() {
    let indptr = vec![0i64, 2, 1];
    let indices = vec![0i64];
    let data = vec![1.0f64];
    let err = Csr::from_parts(2, 3, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("must be non-decreasing"));
}

#[test]
fn column_index_out_of_bounds() {
    let indptr = vec![0i64, 1];
    let indices = vec![3i64];
    let data = vec![1.0f64];
    let err = Csr::from_parts(1, 3, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("out of bounds"));
}

#[test]
fn csc_from_parts_ok() {
    // Column-major mirror of the 2x3 matrix above.
    let indptr = vec![0i64, 1, 2, 3];
    let indices = vec![0i64, 1, 0];
    let data = vec![1.0f64, 3.0, 2.0];
    let csc = Csc::from_parts(2, 3, indptr, indices, data, true).unwrap();
    assert_eq!(csc.nnz(), 3);
    assert_eq!(csc.shape(), (2, 3));
    assert_eq!(csc.col_nnz(1), 1);
}

#[test]
fn csc_row_index_out_of_bounds() {
    let indptr = vec![0i64, 1];
    let indices = vec![5i64];
    let data = vec![1.0f64];
    let err = Csc::from_parts(2, 1, indptr, indices, data, true).unwrap_err();
    assert!(err.contains("out of bounds"));
}
