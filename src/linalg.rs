//! Small dense linear solver.
//!
//! The plane fit solves a 3x3 system and the Gaussian fitter solves a
//! (3k x 3k) damped normal-equation system per iteration; both are small
//! enough that Gaussian elimination with partial pivoting is the right tool.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("matrix is singular or too ill-conditioned to solve")]
    Singular,

    #[error("dimension mismatch: matrix is {rows}x{cols}, rhs has {rhs} entries")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
}

/// Pivot threshold below which the matrix is treated as singular.
const PIVOT_EPSILON: f64 = 1e-12;

/// Solve `a * x = b` for a dense row-major square matrix `a`.
///
/// `a` and `b` are consumed as working storage. `a.len()` must equal
/// `n * n` where `n = b.len()`.
pub fn solve(mut a: Vec<f64>, mut b: Vec<f64>) -> Result<Vec<f64>, LinalgError> {
    let n = b.len();
    if a.len() != n * n {
        return Err(LinalgError::DimensionMismatch {
            rows: a.len() / n.max(1),
            cols: n,
            rhs: n,
        });
    }

    // Forward elimination with partial pivoting.
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_mag = a[col * n + col].abs();
        for row in (col + 1)..n {
            let mag = a[row * n + col].abs();
            if mag > pivot_mag {
                pivot_row = row;
                pivot_mag = mag;
            }
        }
        if pivot_mag < PIVOT_EPSILON {
            return Err(LinalgError::Singular);
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let pivot = a[col * n + col];
        for row in (col + 1)..n {
            let factor = a[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution.
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row * n + k] * x[k];
        }
        x[row] = sum / a[row * n + row];
    }

    Ok(x)
}
