//! Synthetic calibration data.
//!
//! Used by tests and demos to build stage grids, distort them with a known
//! affine transform and add deterministic per-cell residuals.

pub mod grid;
pub mod noise;

pub use grid::*;
pub use noise::*;
