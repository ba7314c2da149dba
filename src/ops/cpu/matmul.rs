//! Row-parallel matrix products over flat row-major slices.
//!
//! The three layouts cover a fully-connected layer: `x·Wᵀ` forward,
//! `dy·W` for the data gradient and `dyᵀ·x` for the weight gradient.

use rayon::prelude::*;

use crate::TensorFloat;

/// `C = A · Bᵀ` with `A: m×k`, `B: n×k`, `C: m×n`.
pub fn matmul_nt(
    a: &[TensorFloat],
    b: &[TensorFloat],
    m: usize,
    k: usize,
    n: usize,
) -> Vec<TensorFloat> {
    assert_eq!(a.len(), m * k, "matmul_nt lhs size mismatch");
    assert_eq!(b.len(), n * k, "matmul_nt rhs size mismatch");

    let mut out = vec![0.0; m * n];
    if k == 0 {
        return out;
    }
    out.par_chunks_mut(n.max(1))
        .zip(a.par_chunks(k))
        .for_each(|(row, a_row)| {
            for (j, c) in row.iter_mut().enumerate() {
                let b_row = &b[j * k..(j + 1) * k];
                *c = a_row.iter().zip(b_row).map(|(x, y)| x * y).sum::<TensorFloat>();
            }
        });
    out
}

/// `C = A · B` with `A: m×k`, `B: k×n`, `C: m×n`.
pub fn matmul_nn(
    a: &[TensorFloat],
    b: &[TensorFloat],
    m: usize,
    k: usize,
    n: usize,
) -> Vec<TensorFloat> {
    assert_eq!(a.len(), m * k, "matmul_nn lhs size mismatch");
    assert_eq!(b.len(), k * n, "matmul_nn rhs size mismatch");

    let mut out = vec![0.0; m * n];
    if k == 0 || n == 0 {
        return out;
    }
    out.par_chunks_mut(n)
        .zip(a.par_chunks(k))
        .for_each(|(row, a_row)| {
            // i-l-j order keeps the inner loop contiguous in both B and C
            for (l, &a_il) in a_row.iter().enumerate() {
                let b_row = &b[l * n..(l + 1) * n];
                for (c, &b_lj) in row.iter_mut().zip(b_row) {
                    *c += a_il * b_lj;
                }
            }
        });
    out
}

/// `C = Aᵀ · B` with `A: m×n`, `B: m×k`, `C: n×k`.
pub fn matmul_tn(
    a: &[TensorFloat],
    b: &[TensorFloat],
    m: usize,
    n: usize,
    k: usize,
) -> Vec<TensorFloat> {
    assert_eq!(a.len(), m * n, "matmul_tn lhs size mismatch");
    assert_eq!(b.len(), m * k, "matmul_tn rhs size mismatch");

    let mut out = vec![0.0; n * k];
    if k == 0 {
        return out;
    }
    out.par_chunks_mut(k).enumerate().for_each(|(j, row)| {
        for i in 0..m {
            let a_ij = a[i * n + j];
            if a_ij == 0.0 {
                continue;
            }
            let b_row = &b[i * k..(i + 1) * k];
            for (c, &b_il) in row.iter_mut().zip(b_row) {
                *c += a_ij * b_il;
            }
        }
    });
    out
}

/// Column sums of an `m×n` matrix.
pub fn sum_rows(a: &[TensorFloat], m: usize, n: usize) -> Vec<TensorFloat> {
    assert_eq!(a.len(), m * n, "sum_rows size mismatch");
    (0..n)
        .into_par_iter()
        .map(|j| (0..m).map(|i| a[i * n + j]).sum::<TensorFloat>())
        .collect()
}
