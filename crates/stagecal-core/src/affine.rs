//! 2D affine transforms.
//!
//! Two representations are used across the workspace:
//!
//! - [`AffineParams`]: six coefficients produced by a fit. Immutable once
//!   built; the inverse is computed lazily and cached for the lifetime of the
//!   instance.
//! - [`AffineMatrix`]: the row-major 3×3 wire form (bottom row `[0, 0, 1]`)
//!   used for machine ↔ pixel mappings.
//!
//! ```text
//! x' = a·x + b·y + c
//! y' = d·x + e·y + f
//! ```

use std::cell::OnceCell;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{CalibError, Mat3, Pt2, Real};

/// Determinant magnitude below which an affine transform is treated as
/// non-invertible.
pub const DET_EPS: Real = 1e-15;

/// Coefficients of an inverse affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineInverse {
    pub a: Real,
    pub b: Real,
    pub c: Real,
    pub d: Real,
    pub e: Real,
    pub f: Real,
}

impl AffineInverse {
    /// Map a point through the inverse transform.
    pub fn apply(&self, p: &Pt2) -> Pt2 {
        Pt2::new(
            p.x * self.a + p.y * self.b + self.c,
            p.x * self.d + p.y * self.e + self.f,
        )
    }
}

/// Forward affine parameters with a lazily computed, cached inverse.
///
/// Coefficients are fixed at construction. Operations that "change" a
/// transform, such as [`AffineParams::with_unit_scale`], return a new value,
/// so the cached inverse never goes stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffineParams {
    a: Real,
    b: Real,
    c: Real,
    d: Real,
    e: Real,
    f: Real,
    #[serde(skip)]
    inverse: OnceCell<AffineInverse>,
}

impl PartialEq for AffineParams {
    fn eq(&self, other: &Self) -> bool {
        self.coeffs() == other.coeffs()
    }
}

impl Default for AffineParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineParams {
    pub fn new(a: Real, b: Real, c: Real, d: Real, e: Real, f: Real) -> Self {
        Self {
            a,
            b,
            c,
            d,
            e,
            f,
            inverse: OnceCell::new(),
        }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Coefficients as `[a, b, c, d, e, f]`.
    pub fn coeffs(&self) -> [Real; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn a(&self) -> Real {
        self.a
    }
    pub fn b(&self) -> Real {
        self.b
    }
    pub fn c(&self) -> Real {
        self.c
    }
    pub fn d(&self) -> Real {
        self.d
    }
    pub fn e(&self) -> Real {
        self.e
    }
    pub fn f(&self) -> Real {
        self.f
    }

    /// Determinant of the linear part, `a·e − b·d`.
    pub fn determinant(&self) -> Real {
        self.a * self.e - self.b * self.d
    }

    /// Copy of these parameters with `a` and `e` forced to `1`.
    ///
    /// Removes the fitted axis scale while keeping shear, rotation terms and
    /// translation. The result is a new instance with its own inverse cache.
    pub fn with_unit_scale(&self) -> Self {
        Self::new(1.0, self.b, self.c, self.d, 1.0, self.f)
    }

    /// Apply the forward transform.
    pub fn apply(&self, p: &Pt2) -> Pt2 {
        Pt2::new(
            p.x * self.a + p.y * self.b + self.c,
            p.x * self.d + p.y * self.e + self.f,
        )
    }

    /// Inverse coefficients, computed on first use and cached.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] when `|a·e − b·d| < 1e-15`.
    pub fn inverse(&self) -> Result<&AffineInverse, CalibError> {
        if let Some(inv) = self.inverse.get() {
            return Ok(inv);
        }
        let inv = self.compute_inverse()?;
        Ok(self.inverse.get_or_init(|| inv))
    }

    /// Apply the inverse transform.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] if the transform is not invertible.
    pub fn apply_inverse(&self, p: &Pt2) -> Result<Pt2, CalibError> {
        Ok(self.inverse()?.apply(p))
    }

    /// `true` once the inverse has been computed for this instance.
    pub fn has_cached_inverse(&self) -> bool {
        self.inverse.get().is_some()
    }

    /// Row-major 3×3 form of these parameters.
    pub fn to_matrix(&self) -> AffineMatrix {
        AffineMatrix::from_params(self)
    }

    fn compute_inverse(&self) -> Result<AffineInverse, CalibError> {
        let det = self.determinant();
        if det.abs() < DET_EPS {
            return Err(CalibError::SingularMatrix { det });
        }
        Ok(AffineInverse {
            a: self.e / det,
            b: -self.b / det,
            c: (self.b * self.f - self.c * self.e) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.c * self.d - self.a * self.f) / det,
        })
    }
}

/// Row-major 3×3 affine matrix with the bottom row fixed to `[0, 0, 1]`.
///
/// Serialized as a flat 9-element sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Real>", into = "[Real; 9]")]
pub struct AffineMatrix(Mat3);

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineMatrix {
    pub fn identity() -> Self {
        Self(Mat3::identity())
    }

    /// Wrap a 3×3 matrix, replacing its bottom row with `[0, 0, 1]`.
    pub fn from_mat3(mut m: Mat3) -> Self {
        let bottom = [m[(2, 0)], m[(2, 1)], m[(2, 2)]];
        if bottom != [0.0, 0.0, 1.0] {
            warn!(
                "affine matrix bottom row {:?} replaced by [0, 0, 1]",
                bottom
            );
            m[(2, 0)] = 0.0;
            m[(2, 1)] = 0.0;
            m[(2, 2)] = 1.0;
        }
        Self(m)
    }

    /// Parse the 9-element row-major wire form.
    ///
    /// # Errors
    ///
    /// [`CalibError::Load`] if `values` does not hold exactly 9 elements.
    pub fn from_row_slice(values: &[Real]) -> Result<Self, CalibError> {
        if values.len() != 9 {
            return Err(CalibError::load(format!(
                "affine matrix needs 9 elements, got {}",
                values.len()
            )));
        }
        Ok(Self::from_mat3(Mat3::from_row_slice(values)))
    }

    pub fn from_params(params: &AffineParams) -> Self {
        let [a, b, c, d, e, f] = params.coeffs();
        Self(Mat3::new(a, b, c, d, e, f, 0.0, 0.0, 1.0))
    }

    /// The six affine coefficients of this matrix.
    pub fn to_params(&self) -> AffineParams {
        let m = &self.0;
        AffineParams::new(
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
        )
    }

    pub fn as_mat3(&self) -> &Mat3 {
        &self.0
    }

    /// Row-major wire form.
    pub fn to_row_array(&self) -> [Real; 9] {
        let m = &self.0;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    pub fn determinant(&self) -> Real {
        self.0[(0, 0)] * self.0[(1, 1)] - self.0[(0, 1)] * self.0[(1, 0)]
    }

    pub fn apply(&self, p: &Pt2) -> Pt2 {
        let m = &self.0;
        Pt2::new(
            p.x * m[(0, 0)] + p.y * m[(0, 1)] + m[(0, 2)],
            p.x * m[(1, 0)] + p.y * m[(1, 1)] + m[(1, 2)],
        )
    }

    /// Inverse matrix.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] when the linear part is not invertible.
    pub fn try_inverse(&self) -> Result<AffineMatrix, CalibError> {
        let inv = *self.to_params().inverse()?;
        Ok(Self(Mat3::new(
            inv.a, inv.b, inv.c, inv.d, inv.e, inv.f, 0.0, 0.0, 1.0,
        )))
    }

    /// Length of the image of a unit x vector, `‖M·(1,0) − M·(0,0)‖`.
    pub fn unit_x_length(&self) -> Real {
        let origin = self.apply(&Pt2::origin());
        let unit = self.apply(&Pt2::new(1.0, 0.0));
        (unit - origin).norm()
    }
}

impl TryFrom<Vec<Real>> for AffineMatrix {
    type Error = CalibError;

    fn try_from(values: Vec<Real>) -> Result<Self, Self::Error> {
        Self::from_row_slice(&values)
    }
}

impl From<AffineMatrix> for [Real; 9] {
    fn from(m: AffineMatrix) -> Self {
        m.to_row_array()
    }
}

impl From<&AffineParams> for AffineMatrix {
    fn from(params: &AffineParams) -> Self {
        Self::from_params(params)
    }
}
