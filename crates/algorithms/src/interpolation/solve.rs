//! Small dense linear solves
//!
//! Both the kriging systems (k+1 unknowns, k ≈ 3–20) and the normal
//! equations of the variogram fit (≤ 5 unknowns) are tiny, so a plain
//! row-major Gaussian elimination is all that is needed.

use echostat_core::{Error, Result};

/// Pivot magnitude below which a system is treated as singular.
pub(crate) const PIVOT_EPS: f64 = 1e-14;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// `mat` is `n × n` row-major and is destroyed, as is `rhs`.
pub(crate) fn solve_dense(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    debug_assert_eq!(mat.len(), n * n);
    debug_assert_eq!(rhs.len(), n);

    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if !(max_val >= PIVOT_EPS) {
            return Err(Error::Algorithm("singular matrix".into()));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Algorithm("non-finite solution".into()));
    }
    Ok(x)
}
