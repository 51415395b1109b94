use approx::assert_abs_diff_eq;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rill_core::Csr;
use rill_kernels::*;

fn big_cfg() -> PartitionConfig {
    PartitionConfig::square(1 << 20)
}

fn random_csr(seed: u64, nrows: usize, ncols: usize, max_row_nnz: usize) -> Csr<f64, i64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indptr = vec![0i64];
    let mut indices = Vec::new();
    let mut data = Vec::new();
    for _ in 0..nrows {
        let nnz = rng.gen_range(0..=max_row_nnz.min(ncols));
        let mut cols: Vec<i64> = Vec::with_capacity(nnz);
        while cols.len() < nnz {
            let c = rng.gen_range(0..ncols) as i64;
            if !cols.contains(&c) {
                cols.push(c);
            }
        }
        cols.sort_unstable();
        for c in cols {
            indices.push(c);
            data.push(rng.gen_range(-1.0..1.0));
        }
        indptr.push(indices.len() as i64);
    }
    Csr::from_parts(nrows, ncols, indptr, indices, data, true).unwrap()
}

fn random_x(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect()
}

fn check_round_trip(a: &Csr<f64, i64>, x: &[f64], y_parts: usize, x_parts: usize) {
    let (tiles, y_part_rows) = partition_balanced(a, y_parts, x_parts, &big_cfg()).unwrap();
    let y = tiled_spmv_scattered(&tiles, &y_part_rows, x, a.nrows).unwrap();
    let expected = spmv_f64_i64(a, x);
    assert_eq!(y.len(), expected.len());
    for (yi, ei) in y.iter().zip(&expected) {
        assert_abs_diff_eq!(*yi, *ei, epsilon = 1e-10);
    }
}

#[test]
fn test_round_trip_grids() {
    let _ = env_logger::builder().is_test(true).try_init();
    let a = random_csr(42, 50, 37, 12);
    let x = random_x(43, 37);
    for (y_parts, x_parts) in [(1usize, 1usize), (2, 2), (3, 2), (4, 4), (7, 3)] {
        check_round_trip(&a, &x, y_parts, x_parts);
    }
}

#[test]
fn test_round_trip_skewed_rows() {
    // A few heavy rows among many light ones stresses the snake balance and
    // rows spanning several blocks.
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let nrows = 30usize;
    let ncols = 120usize;
    let mut indptr = vec![0i64];
    let mut indices = Vec::new();
    let mut data = Vec::new();
    for r in 0..nrows {
        let nnz = if r % 10 == 0 { 100 } else { rng.gen_range(0..4) };
        let mut cols: Vec<i64> = Vec::with_capacity(nnz);
        while cols.len() < nnz {
            let c = rng.gen_range(0..ncols) as i64;
            if !cols.contains(&c) {
                cols.push(c);
            }
        }
        cols.sort_unstable();
        for c in cols {
            indices.push(c);
            data.push(rng.gen_range(-1.0..1.0));
        }
        indptr.push(indices.len() as i64);
    }
    let a = Csr::from_parts(nrows, ncols, indptr, indices, data, true).unwrap();
    let x = random_x(100, ncols);
    for (y_parts, x_parts) in [(3usize, 1usize), (4, 5), (6, 2)] {
        check_round_trip(&a, &x, y_parts, x_parts);
    }
}

#[test]
fn test_end_to_end_4x4() {
    // A = [[0,0,0,0],[0,0,5,0],[1,2,0,3],[4,0,6,0]], row nnz [0,1,3,2].
    let indptr = vec![0i64, 0, 1, 4, 6];
    let indices = vec![2i64, 0, 1, 3, 0, 2];
    let data = vec![5.0f64, 1.0, 2.0, 3.0, 4.0, 6.0];
    let a = Csr::from_parts(4, 4, indptr, indices, data, true).unwrap();
    let x = vec![1.0, 2.0, 3.0, 4.0];

    let (tiles, y_part_rows) = partition_balanced(&a, 2, 1, &big_cfg()).unwrap();
    assert_eq!(y_part_rows, vec![vec![0, 2], vec![1, 3]]);
    let y = tiled_spmv_scattered(&tiles, &y_part_rows, &x, 4).unwrap();
    assert_abs_diff_eq!(y[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(y[1], 15.0, epsilon = 1e-12);
    assert_abs_diff_eq!(y[2], 17.0, epsilon = 1e-12);
    assert_abs_diff_eq!(y[3], 22.0, epsilon = 1e-12);
}

#[test]
fn test_scatter_writes_disjoint_rows() {
    let part_sums = vec![vec![1.5, 2.5], vec![3.5, 4.5]];
    let y_part_rows = vec![vec![0usize, 2], vec![1, 3]];
    let mut out = vec![0.0f64; 4];
    scatter(&part_sums, &y_part_rows, &mut out);
    assert_eq!(out, vec![1.5, 3.5, 2.5, 4.5]);

    // Repeating the scatter is a no-op.
    scatter(&part_sums, &y_part_rows, &mut out);
    assert_eq!(out, vec![1.5, 3.5, 2.5, 4.5]);
}

#[test]
fn test_all_empty_rows() {
    let a = Csr::from_parts(6, 5, vec![0i64; 7], vec![], vec![], true).unwrap();
    let x = random_x(5, 5);
    let (tiles, y_part_rows) = partition_balanced(&a, 3, 2, &big_cfg()).unwrap();
    let y = tiled_spmv_scattered(&tiles, &y_part_rows, &x, 6).unwrap();
    assert_eq!(y, vec![0.0; 6]);
}

#[test]
fn test_partition_sums_before_scatter() {
    // tiled_spmv alone returns local-order sums matching the permutation.
    let a = random_csr(8, 12, 9, 5);
    let x = random_x(9, 9);
    let (tiles, y_part_rows) = partition_balanced(&a, 3, 3, &big_cfg()).unwrap();
    let part_sums = tiled_spmv(&tiles, &x).unwrap();
    let expected = spmv_f64_i64(&a, &x);
    for (sums, rows) in part_sums.iter().zip(&y_part_rows) {
        assert_eq!(sums.len(), rows.len());
        for (s, &r) in sums.iter().zip(rows) {
            assert_abs_diff_eq!(*s, expected[r], epsilon = 1e-10);
        }
    }
}
