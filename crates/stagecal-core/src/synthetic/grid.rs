//! Regular stage grids and affine-distorted observations of them.

use crate::{AffineParams, Pt2, Real, Vec2};

/// Generate a `nx * ny` lattice of stage positions starting at `origin`.
///
/// Points are ordered deterministically in row-major order (Y major), so the
/// position of column `i`, row `j` sits at flat index `i + j * nx`.
pub fn grid_points_2d(nx: usize, ny: usize, origin: Pt2, step: Vec2) -> Vec<Pt2> {
    let mut points = Vec::with_capacity(nx.saturating_mul(ny));
    for j in 0..ny {
        for i in 0..nx {
            points.push(Pt2::new(
                origin.x + i as Real * step.x,
                origin.y + j as Real * step.y,
            ));
        }
    }
    points
}

/// Offsets that a camera would observe at each shot position if the stage
/// were seen through `distortion`.
///
/// The returned offset for shot `s` is `distortion⁻¹(s) − s`, so that
/// `s + offset` is the raw observed position and fitting observed → shot
/// recovers `distortion` exactly.
pub fn offsets_through(distortion: &AffineParams, shots: &[Pt2]) -> Option<Vec<Vec2>> {
    let inv = distortion.inverse().ok()?;
    Some(shots.iter().map(|s| inv.apply(s) - s).collect())
}
