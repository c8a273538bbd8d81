//! Closed-form solvers for stage ↔ pixel calibration.
//!
//! - [`AffineSolver`]: least-squares 2D affine fit from `N ≥ 3`
//!   correspondences (normal equations + Gaussian elimination with partial
//!   pivoting), plus the fixed 9-point variant used for 3×3 calibration grids.
//! - [`pitch`]: synthesizes the 3×3 correspondence grid for a simple
//!   per-axis pixel-pitch calibration.
//! - [`math`]: the dense linear solver shared by the fits.

mod affine_fit;
pub mod math;
pub mod pitch;

pub use affine_fit::*;
pub use pitch::pitch_grid_correspondences;
