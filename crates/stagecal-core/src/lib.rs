//! Core math primitives for `stagecal`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Vec2`, `Mat3`),
//! - affine transforms in coefficient ([`AffineParams`]) and 3×3 wire
//!   ([`AffineMatrix`]) form,
//! - the shared error taxonomy ([`CalibError`]) and integer [`StatusCode`]s,
//! - synthetic grid helpers for tests and demos.
//!
//! Coordinate pipeline used by the display layer:
//! `screen = (M · (machine − reference)) · zoom + pan`

/// Affine parameter and matrix types.
pub mod affine;
/// Error taxonomy and status codes.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Synthetic grids and deterministic residuals.
pub mod synthetic;

pub use affine::*;
pub use error::*;
pub use math::*;
