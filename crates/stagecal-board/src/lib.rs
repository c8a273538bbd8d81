//! Calibration-board correction for a motion stage.
//!
//! A board with a regular lattice of marks is visited shot by shot; at every
//! shot the camera reports how far the nearest mark sits from the field-of-view
//! centre, expressed as a stage-millimetre offset. [`BoardCalibModel`] holds
//! those offsets and answers two questions:
//!
//! - what global rotation/skew separates the stage axes from the board axes
//!   ([`BoardCalibModel::angle_normalization`]),
//! - what local offset applies at an arbitrary stage position
//!   ([`BoardCalibModel::mach_to_board_coord`]), by blending the four
//!   surrounding grid cells.
//!
//! Records are read from and written to JSON ([`BoardCalibRecord`]), including
//! files written by older tooling with `m_`-prefixed field names.

mod config;
mod grid;
mod model;
mod record;

pub use config::BoardCalibConfig;
pub use grid::CalibrationGrid;
pub use model::{BoardCalibModel, ResidualSummary};
pub use record::{BoardCalibRecord, IndexedPoint};
