//! Correspondences for a per-axis pixel-pitch calibration.
//!
//! A camera with a known pixel pitch (mm per pixel) and no rotation maps the
//! stage millimetre at `(i, j)` relative to the image centre onto pixel
//! `(w/2 + i / pitch.x, h/2 − j / pitch.y)`; the y axis flips because image
//! rows grow downwards. Nine such pairs on a 3×3 millimetre grid feed
//! [`AffineSolver::fit_grid9`](crate::AffineSolver::fit_grid9).

use stagecal_core::{CalibError, Pt2, Real, Vec2};

/// Millimetre offsets of the synthesized grid, top row first.
const GRID_MM: [(Real, Real); 9] = [
    (-1.0, 1.0),
    (0.0, 1.0),
    (1.0, 1.0),
    (-1.0, 0.0),
    (0.0, 0.0),
    (1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

/// Build the 9 (mm, pixel) correspondences for a pitch calibration.
///
/// Image halves use integer division, so an odd width puts the centre on the
/// lower pixel.
///
/// # Errors
///
/// [`CalibError::InvalidPitch`] if either pitch component is zero, not finite,
/// or so small that its reciprocal overflows.
pub fn pitch_grid_correspondences(
    pitch: Vec2,
    width: u32,
    height: u32,
) -> Result<(Vec<Pt2>, Vec<Pt2>), CalibError> {
    let inv_x = 1.0 / pitch.x;
    let inv_y = 1.0 / pitch.y;
    if !pitch.x.is_finite()
        || !pitch.y.is_finite()
        || pitch.x == 0.0
        || pitch.y == 0.0
        || !inv_x.is_finite()
        || !inv_y.is_finite()
    {
        return Err(CalibError::InvalidPitch {
            x: pitch.x,
            y: pitch.y,
        });
    }

    let half_w = (width / 2) as Real;
    let half_h = (height / 2) as Real;

    let (mm, px) = GRID_MM
        .iter()
        .map(|&(i, j)| (Pt2::new(i, j), Pt2::new(half_w + i * inv_x, half_h - j * inv_y)))
        .unzip();
    Ok((mm, px))
}
