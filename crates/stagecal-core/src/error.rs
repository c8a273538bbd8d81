//! Error taxonomy shared by every calibration crate, plus the integer status
//! codes exposed to integrators that cannot consume `Result`.

use crate::Real;
use thiserror::Error;

/// Errors reported by fitting, inversion, loading and grid lookup.
///
/// Every failing operation leaves the state it was called on unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibError {
    /// The least-squares normal system is rank deficient or ill-conditioned.
    #[error("singular least-squares system: pivot {pivot:e} in column {column}")]
    SingularSystem {
        /// Elimination column where the pivot collapsed.
        column: usize,
        /// Absolute value of the rejected pivot.
        pivot: Real,
    },
    /// The affine transform has no inverse.
    #[error("affine transform is not invertible (det = {det:e})")]
    SingularMatrix {
        /// Determinant of the linear part.
        det: Real,
    },
    /// Calibration source could not be read or is malformed.
    #[error("failed to load calibration: {0}")]
    Load(String),
    /// Calibration record could not be written.
    #[error("failed to save calibration: {0}")]
    Save(String),
    /// A grid index has no stored vision offset or shot position.
    #[error("no calibration data for grid index {0}")]
    MissingGridData(usize),
    /// Point sequences have mismatched or unsupported lengths.
    #[error("shape mismatch: need {expected} correspondences, got {source_len} source / {target_len} target")]
    ShapeMismatch {
        /// Required count (or minimum) for the operation.
        expected: usize,
        /// Number of source points supplied.
        source_len: usize,
        /// Number of target points supplied.
        target_len: usize,
    },
    /// Query point cannot be placed on the grid (non-finite coordinates).
    #[error("point ({x}, {y}) is outside the usable range")]
    PointOutOfRange {
        /// Query x.
        x: Real,
        /// Query y.
        y: Real,
    },
    /// Pixel pitch is zero or not finite.
    #[error("invalid pixel pitch ({x}, {y}) mm/px")]
    InvalidPitch {
        /// Pitch along x.
        x: Real,
        /// Pitch along y.
        y: Real,
    },
}

impl CalibError {
    /// Build a [`CalibError::Load`] from anything printable.
    pub fn load(msg: impl std::fmt::Display) -> Self {
        Self::Load(msg.to_string())
    }

    /// Integer status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CalibError::Load(_) | CalibError::Save(_) => StatusCode::NoCalibrationData,
            CalibError::PointOutOfRange { .. } | CalibError::InvalidPitch { .. } => {
                StatusCode::OutOfRange
            }
            CalibError::MissingGridData(_) => StatusCode::MissingGridData,
            CalibError::SingularSystem { .. } | CalibError::SingularMatrix { .. } => {
                StatusCode::Singular
            }
            CalibError::ShapeMismatch { .. } => StatusCode::ShapeMismatch,
        }
    }
}

/// Integer status codes: `0` is success, negative values classify failures.
///
/// | code | meaning |
/// |------|---------|
/// | `0`  | success |
/// | `-1` | no or unreadable calibration data |
/// | `-2` | point or parameter outside the usable range |
/// | `-3` | grid index without data |
/// | `-4` | singular system or matrix |
/// | `-5` | mismatched or insufficient point counts |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    NoCalibrationData = -1,
    OutOfRange = -2,
    MissingGridData = -3,
    Singular = -4,
    ShapeMismatch = -5,
}

impl StatusCode {
    /// Status of an operation result.
    pub fn of<T>(result: &Result<T, CalibError>) -> Self {
        match result {
            Ok(_) => StatusCode::Ok,
            Err(err) => err.status_code(),
        }
    }

    /// Raw integer value.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        code.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(StatusCode::of(&Ok::<(), CalibError>(())).code(), 0);
        assert_eq!(CalibError::load("bad json").status_code().code(), -1);
        assert_eq!(
            CalibError::PointOutOfRange {
                x: Real::NAN,
                y: 0.0
            }
            .status_code()
            .code(),
            -2
        );
        assert_eq!(CalibError::MissingGridData(7).status_code().code(), -3);
        assert_eq!(
            CalibError::SingularMatrix { det: 0.0 }.status_code(),
            CalibError::SingularSystem {
                column: 1,
                pivot: 0.0
            }
            .status_code()
        );
        assert_eq!(
            i32::from(
                CalibError::ShapeMismatch {
                    expected: 9,
                    source_len: 8,
                    target_len: 9
                }
                .status_code()
            ),
            -5
        );
    }

    #[test]
    fn messages_name_the_problem() {
        let err = CalibError::MissingGridData(12);
        assert_eq!(err.to_string(), "no calibration data for grid index 12");
        let err = CalibError::load("unexpected end of file");
        assert!(err.to_string().contains("unexpected end of file"));
    }
}
