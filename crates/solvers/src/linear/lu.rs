//! In-place LU factorization with partial pivoting, row-major storage.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("matrix is singular at column {column}")]
pub(crate) struct Singular {
    pub column: usize,
}

/// Factors `a` (n×n) into `L·U` in place, recording row swaps in `pivot`.
pub(crate) fn factor(a: &mut [f64], pivot: &mut [usize], n: usize) -> Result<(), Singular> {
    for (i, p) in pivot.iter_mut().enumerate() {
        *p = i;
    }

    for k in 0..n {
        let mut max_val = a[k * n + k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = a[i * n + k].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }
        if max_val == 0.0 || !max_val.is_finite() {
            return Err(Singular { column: k });
        }

        if max_row != k {
            pivot.swap(k, max_row);
            for j in 0..n {
                a.swap(k * n + j, max_row * n + j);
            }
        }

        let akk = a[k * n + k];
        for i in (k + 1)..n {
            a[i * n + k] /= akk;
            let lik = a[i * n + k];
            for j in (k + 1)..n {
                a[i * n + j] -= lik * a[k * n + j];
            }
        }
    }

    Ok(())
}

/// Solves `A x = b` in place using a factorization from [`factor`].
///
/// `scratch` must hold at least `n` elements.
pub(crate) fn solve(a: &[f64], pivot: &[usize], b: &mut [f64], scratch: &mut [f64], n: usize) {
    for i in 0..n {
        scratch[i] = b[pivot[i]];
    }

    for i in 0..n {
        for j in 0..i {
            scratch[i] -= a[i * n + j] * scratch[j];
        }
    }

    for i in (0..n).rev() {
        for j in (i + 1)..n {
            scratch[i] -= a[i * n + j] * scratch[j];
        }
        scratch[i] /= a[i * n + i];
    }

    b[..n].copy_from_slice(&scratch[..n]);
}
