//! Dense linear solver used by the least-squares fits.
//!
//! The normal equations of the affine fit are small (6×6), so a direct
//! Gaussian elimination with partial pivoting is used instead of a
//! decomposition. Pivot selection is deterministic: for each column the first
//! row holding the largest absolute value is chosen, which keeps results
//! reproducible for identical inputs.

use nalgebra::{SMatrix, SVector};
use stagecal_core::{CalibError, Real};

/// Pivot magnitude below which the system is reported as singular.
pub const PIVOT_EPS: Real = 1e-15;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// # Errors
///
/// [`CalibError::SingularSystem`] when a pivot's absolute value falls below
/// [`PIVOT_EPS`]. The solve is never retried or regularised.
///
/// # Example
///
/// ```
/// use nalgebra::{Matrix2, Vector2};
/// use stagecal_linear::math::solve_gaussian;
///
/// let a = Matrix2::new(0.0, 2.0, 1.0, 1.0);
/// let b = Vector2::new(4.0, 3.0);
/// let x = solve_gaussian(a, b).unwrap();
/// assert!((x[0] - 1.0).abs() < 1e-12);
/// assert!((x[1] - 2.0).abs() < 1e-12);
/// ```
pub fn solve_gaussian<const N: usize>(
    mut a: SMatrix<Real, N, N>,
    mut b: SVector<Real, N>,
) -> Result<SVector<Real, N>, CalibError> {
    // forward elimination
    for i in 0..N {
        let mut max_row = i;
        for k in (i + 1)..N {
            if a[(k, i)].abs() > a[(max_row, i)].abs() {
                max_row = k;
            }
        }
        if max_row != i {
            a.swap_rows(i, max_row);
            b.swap_rows(i, max_row);
        }

        let pivot = a[(i, i)];
        if pivot.abs() < PIVOT_EPS {
            return Err(CalibError::SingularSystem {
                column: i,
                pivot: pivot.abs(),
            });
        }

        for k in (i + 1)..N {
            let factor = a[(k, i)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in i..N {
                a[(k, j)] -= factor * a[(i, j)];
            }
            b[k] -= factor * b[i];
        }
    }

    // back substitution
    let mut x = SVector::<Real, N>::zeros();
    for i in (0..N).rev() {
        let mut acc = b[i];
        for j in (i + 1)..N {
            acc -= a[(i, j)] * x[j];
        }
        x[i] = acc / a[(i, i)];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn solves_system_needing_row_swap() {
        let a = Matrix3::new(0.0, 1.0, 1.0, 2.0, 1.0, 0.0, 1.0, 0.0, 3.0);
        let x_gt = Vector3::new(1.0, -2.0, 0.5);
        let b = a * x_gt;
        let x = solve_gaussian(a, b).unwrap();
        assert!((x - x_gt).norm() < 1e-12, "x = {x:?}");
    }

    #[test]
    fn zero_column_is_singular() {
        let a = Matrix3::new(1.0, 0.0, 2.0, 3.0, 0.0, 1.0, 4.0, 0.0, 5.0);
        let err = solve_gaussian(a, Vector3::new(1.0, 2.0, 3.0)).unwrap_err();
        assert_eq!(
            err,
            CalibError::SingularSystem {
                column: 1,
                pivot: 0.0
            }
        );
    }

    #[test]
    fn dependent_rows_are_singular() {
        let a = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 0.0, 1.0);
        assert!(matches!(
            solve_gaussian(a, Vector3::new(1.0, 2.0, 3.0)),
            Err(CalibError::SingularSystem { .. })
        ));
    }

    #[test]
    fn tiny_but_valid_pivots_pass() {
        let a = Matrix3::new(1e-12, 0.0, 0.0, 0.0, 1e-12, 0.0, 0.0, 0.0, 1e-12);
        let x = solve_gaussian(a, Vector3::new(1e-12, 2e-12, 3e-12)).unwrap();
        assert!((x - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }
}
