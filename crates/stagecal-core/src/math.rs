//! Mathematical type aliases and a point check.
//!
//! Stage (millimetre) and pixel coordinates share the same point type; the
//! unit is fixed by the operation, never mixed inside one call.

use nalgebra::{Matrix3, Point2, Vector2};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components (offsets, pitches, pan).
pub type Vec2 = Vector2<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// `true` when both coordinates are finite.
pub fn is_finite_point(p: &Pt2) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
