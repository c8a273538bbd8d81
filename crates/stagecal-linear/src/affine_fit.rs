use log::debug;
use nalgebra::{Matrix6, Vector6};
use stagecal_core::{AffineParams, CalibError, Pt2, Real};

use crate::math::solve_gaussian;

/// Least-squares fit of a 2D affine transform `target ≈ T(source)`.
///
/// Every correspondence contributes two rows to the design matrix:
///
/// ```text
/// [x  y  1  0  0  0] · [a b c d e f]ᵗ = x'
/// [0  0  0  x  y  1] · [a b c d e f]ᵗ = y'
/// ```
///
/// and the 6×6 normal system `AᵗA·p = Aᵗb` is solved with
/// [`solve_gaussian`](crate::math::solve_gaussian).
#[derive(Debug, Clone, Copy)]
pub struct AffineSolver;

/// Minimum number of correspondences for a determined affine fit.
pub const MIN_AFFINE_POINTS: usize = 3;

/// Number of correspondences in the 3×3 calibration grid variant.
pub const GRID9_POINTS: usize = 9;

/// Sources with `det(S) ≤ SPREAD_EPS · tr(S)²` for their centred scatter
/// matrix `S` are treated as collinear.
pub const SPREAD_EPS: Real = 1e-12;

/// Fit `target ≈ T(source)`; see [`AffineSolver::fit`].
pub fn fit_affine(source: &[Pt2], target: &[Pt2]) -> Result<AffineParams, CalibError> {
    AffineSolver::fit(source, target)
}

impl AffineSolver {
    /// Fit an affine transform to `N ≥ 3` correspondences.
    ///
    /// # Errors
    ///
    /// - [`CalibError::ShapeMismatch`] if the sequences differ in length.
    /// - [`CalibError::SingularSystem`] with fewer than 3 correspondences, or
    ///   when the sources are degenerate (e.g. collinear).
    pub fn fit(source: &[Pt2], target: &[Pt2]) -> Result<AffineParams, CalibError> {
        if source.len() != target.len() {
            return Err(CalibError::ShapeMismatch {
                expected: MIN_AFFINE_POINTS,
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        if source.len() < MIN_AFFINE_POINTS {
            // rank(AᵗA) ≤ 2N < 6
            return Err(CalibError::SingularSystem {
                column: 2 * source.len(),
                pivot: 0.0,
            });
        }

        check_spread(source)?;

        let (ata, atb) = normal_equations(source, target);
        let p = solve_gaussian(ata, atb)?;
        let params = AffineParams::new(p[0], p[1], p[2], p[3], p[4], p[5]);
        debug!(
            "affine fit over {} correspondences: {:?}, det = {:.6}",
            source.len(),
            params.coeffs(),
            params.determinant()
        );
        Ok(params)
    }

    /// Fit over exactly nine correspondences (3×3 calibration grid).
    ///
    /// # Errors
    ///
    /// [`CalibError::ShapeMismatch`] unless both sequences hold exactly 9
    /// points; otherwise as [`AffineSolver::fit`].
    pub fn fit_grid9(source: &[Pt2], target: &[Pt2]) -> Result<AffineParams, CalibError> {
        if source.len() != GRID9_POINTS || target.len() != GRID9_POINTS {
            return Err(CalibError::ShapeMismatch {
                expected: GRID9_POINTS,
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        Self::fit(source, target)
    }
}

/// Reject sources that span a line or a single point.
///
/// Elimination on such input rarely cancels to an exact zero pivot once the
/// coordinates are not small integers, so the spread is checked up front.
fn check_spread(source: &[Pt2]) -> Result<(), CalibError> {
    let n = source.len() as Real;
    let (sx, sy) = source
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (mx, my) = (sx / n, sy / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in source {
        let (dx, dy) = (p.x - mx, p.y - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    if det.is_nan() || det <= SPREAD_EPS * trace * trace {
        debug!("degenerate source spread: det = {det:e}, trace = {trace:e}");
        return Err(CalibError::SingularSystem {
            column: 1,
            pivot: det.abs(),
        });
    }
    Ok(())
}

/// Accumulate `AᵗA` and `Aᵗb` without materialising the `2N × 6` design
/// matrix.
fn normal_equations(source: &[Pt2], target: &[Pt2]) -> (Matrix6<Real>, Vector6<Real>) {
    let mut ata = Matrix6::<Real>::zeros();
    let mut atb = Vector6::<Real>::zeros();

    for (src, tgt) in source.iter().zip(target) {
        let row = [src.x, src.y, 1.0];
        for r in 0..3 {
            for c in 0..3 {
                let v = row[r] * row[c];
                ata[(r, c)] += v;
                ata[(r + 3, c + 3)] += v;
            }
            atb[r] += row[r] * tgt.x;
            atb[r + 3] += row[r] * tgt.y;
        }
    }
    (ata, atb)
}

/// Euclidean residual `‖T(source_i) − target_i‖` per correspondence.
pub fn fit_residuals(params: &AffineParams, source: &[Pt2], target: &[Pt2]) -> Vec<Real> {
    source
        .iter()
        .zip(target)
        .map(|(s, t)| (params.apply(s) - t).norm())
        .collect()
}

/// Root-mean-square of [`fit_residuals`]; `0` for empty input.
pub fn rms_residual(params: &AffineParams, source: &[Pt2], target: &[Pt2]) -> Real {
    let res = fit_residuals(params, source, target);
    if res.is_empty() {
        return 0.0;
    }
    let ss: Real = res.iter().map(|r| r * r).sum();
    (ss / res.len() as Real).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_points_fit_exactly() {
        let src = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0), Pt2::new(0.0, 1.0)];
        let gt = AffineParams::new(2.0, 0.5, 10.0, -0.25, 3.0, -4.0);
        let tgt: Vec<Pt2> = src.iter().map(|p| gt.apply(p)).collect();

        let fit = AffineSolver::fit(&src, &tgt).unwrap();
        for (a, b) in fit.coeffs().iter().zip(gt.coeffs()) {
            assert!((a - b).abs() < 1e-10, "{:?} vs {:?}", fit.coeffs(), gt.coeffs());
        }
    }

    #[test]
    fn two_points_are_singular() {
        let src = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 1.0)];
        let err = AffineSolver::fit(&src, &src).unwrap_err();
        assert!(matches!(err, CalibError::SingularSystem { .. }));
    }

    #[test]
    fn length_mismatch_is_shape_error() {
        let src = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0), Pt2::new(0.0, 1.0)];
        let err = AffineSolver::fit(&src, &src[..2]).unwrap_err();
        assert_eq!(
            err,
            CalibError::ShapeMismatch {
                expected: 3,
                source_len: 3,
                target_len: 2
            }
        );
    }

    #[test]
    fn grid9_requires_nine_points() {
        let src = [Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0), Pt2::new(0.0, 1.0)];
        let err = AffineSolver::fit_grid9(&src, &src).unwrap_err();
        assert!(matches!(err, CalibError::ShapeMismatch { expected: 9, .. }));
    }

    #[test]
    fn rms_is_zero_for_exact_data() {
        let src = [
            Pt2::new(0.0, 0.0),
            Pt2::new(5.0, 0.0),
            Pt2::new(0.0, 5.0),
            Pt2::new(5.0, 5.0),
        ];
        let gt = AffineParams::new(1.0, 0.01, 0.2, -0.01, 1.0, 0.3);
        let tgt: Vec<Pt2> = src.iter().map(|p| gt.apply(p)).collect();
        let fit = fit_affine(&src, &tgt).unwrap();
        assert!(rms_residual(&fit, &src, &tgt) < 1e-10);
        assert_eq!(rms_residual(&fit, &[], &[]), 0.0);
    }
}
