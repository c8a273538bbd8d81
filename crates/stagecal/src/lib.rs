//! High-level entry crate for the `stagecal` toolbox.
//!
//! `stagecal` maps coordinates between a motion stage (millimetres) and a
//! camera image (pixels). It offers two calibration strategies:
//!
//! ## 1. Global affine fit
//!
//! A least-squares 2D affine transform from point correspondences, or from a
//! plain pixel pitch:
//!
//! ```
//! use stagecal::prelude::*;
//!
//! # fn main() -> Result<(), CalibError> {
//! let mut chain = CoordinateTransformChain::new();
//! chain.set_pixel_pitch(Vec2::new(0.005, 0.005), 1280, 1024)?;
//!
//! // the reference stage position sits at the image centre
//! let reference = Pt2::new(120.0, 80.0);
//! let px = chain.project(&Pt2::new(120.5, 80.0), &reference);
//! assert!((px.x - 740.0).abs() < 1e-6);
//!
//! let back = chain.inverse_transform(&px, &reference)?;
//! assert!((back.x - 120.5).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Calibration-board correction
//!
//! A lattice of per-cell vision offsets, normalized for global rotation and
//! blended bilinearly at query time:
//!
//! ```no_run
//! use stagecal::prelude::*;
//!
//! # fn main() -> Result<(), CalibError> {
//! let mut board = BoardCalibModel::load("board.json")?;
//! let params = board.angle_normalization(false)?;
//! println!("removed rotation/skew: {:?}", params.coeffs());
//!
//! let offset = board.mach_to_board_coord(&Pt2::new(12.0, 34.0))?;
//! println!("board offset at (12, 34): {offset}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: math types, affine parameters, errors and status codes
//! - **[`linear`]**: least-squares affine fitting
//! - **[`board`]**: calibration-board model and record format
//! - **[`view`]**: display transform chain, zoom/pan, overlay visibility
//! - **[`prelude`]**: convenient re-exports for common use cases

/// Math types, affine transforms, error taxonomy and status codes.
pub mod core {
    pub use stagecal_core::*;
}

/// Least-squares affine fitting and pixel-pitch correspondences.
pub mod linear {
    pub use stagecal_linear::*;
}

/// Calibration-board grid model.
pub mod board {
    pub use stagecal_board::*;
}

/// Machine → pixel → screen transforms and overlay primitives.
pub mod view {
    pub use stagecal_view::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use stagecal::prelude::*;`.
pub mod prelude {
    pub use crate::core::{
        AffineMatrix, AffineParams, CalibError, Mat3, Pt2, Real, StatusCode, Vec2,
    };

    pub use crate::linear::{fit_affine, AffineSolver};

    pub use crate::board::{BoardCalibConfig, BoardCalibModel, BoardCalibRecord};

    pub use crate::view::{
        CoordinateTransformChain, DisplayBounds, Primitive, PrimitiveKind, ScreenTransform,
    };
}
