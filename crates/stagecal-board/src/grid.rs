use serde::Serialize;
use stagecal_core::{CalibError, Pt2, Real};

use crate::BoardCalibRecord;

/// Relative tolerance for `range == end − start`.
const RANGE_REL_TOL: Real = 1e-9;

/// Geometry of the calibration lattice.
///
/// Cells are addressed by flat index `col + row * total_x_num`. Validated on
/// construction: steps are strictly positive, totals at least 1 and the
/// ranges agree with `end − start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationGrid {
    start_x: Real,
    start_y: Real,
    step_x: Real,
    step_y: Real,
    end_x: Real,
    end_y: Real,
    x_range: Real,
    y_range: Real,
    total_x_num: usize,
    total_y_num: usize,
    mov_type: i32,
}

impl CalibrationGrid {
    /// Validate the geometry part of a record.
    ///
    /// # Errors
    ///
    /// [`CalibError::Load`] naming the first violated constraint.
    pub fn from_record(record: &BoardCalibRecord) -> Result<Self, CalibError> {
        for (name, v) in [
            ("start_x", record.start_x),
            ("start_y", record.start_y),
            ("end_x", record.end_x),
            ("end_y", record.end_y),
        ] {
            if !v.is_finite() {
                return Err(CalibError::load(format!("{name} is not finite ({v})")));
            }
        }
        for (name, v) in [("step_x", record.step_x), ("step_y", record.step_y)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CalibError::load(format!(
                    "{name} must be positive and finite, got {v}"
                )));
            }
        }

        let total_x_num = positive_count("total_x_num", record.total_x_num)?;
        let total_y_num = positive_count("total_y_num", record.total_y_num)?;
        if total_x_num.checked_mul(total_y_num).is_none() {
            return Err(CalibError::load(format!(
                "grid of {total_x_num}×{total_y_num} cells is too large"
            )));
        }

        let x_range = checked_range("x", record.x_range, record.start_x, record.end_x)?;
        let y_range = checked_range("y", record.y_range, record.start_y, record.end_y)?;

        Ok(Self {
            start_x: record.start_x,
            start_y: record.start_y,
            step_x: record.step_x,
            step_y: record.step_y,
            end_x: record.end_x,
            end_y: record.end_y,
            x_range,
            y_range,
            total_x_num,
            total_y_num,
            mov_type: record.mov_type,
        })
    }

    /// Number of cells, `total_x_num * total_y_num`.
    pub fn cells(&self) -> usize {
        self.total_x_num * self.total_y_num
    }

    pub fn total_x_num(&self) -> usize {
        self.total_x_num
    }

    pub fn total_y_num(&self) -> usize {
        self.total_y_num
    }

    pub fn start(&self) -> Pt2 {
        Pt2::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Pt2 {
        Pt2::new(self.end_x, self.end_y)
    }

    pub fn step_x(&self) -> Real {
        self.step_x
    }

    pub fn step_y(&self) -> Real {
        self.step_y
    }

    pub fn x_range(&self) -> Real {
        self.x_range
    }

    pub fn y_range(&self) -> Real {
        self.y_range
    }

    pub fn mov_type(&self) -> i32 {
        self.mov_type
    }

    /// Flat index of `(col, row)`.
    pub fn flat_index(&self, col: usize, row: usize) -> usize {
        col + row * self.total_x_num
    }

    /// Flat indices of the four cells around `p`, ordered
    /// `[(col, row), (col+1, row), (col, row+1), (col+1, row+1)]`.
    ///
    /// A coordinate before the start (after the end) collapses both of its
    /// indices to the first (last) column or row. Interior neighbours that
    /// would fall past the last column or row are clamped to it, so every
    /// returned index is below [`cells`](Self::cells).
    ///
    /// # Errors
    ///
    /// [`CalibError::PointOutOfRange`] if `p` has a non-finite coordinate.
    pub fn neighbour_indices(&self, p: &Pt2) -> Result<[usize; 4], CalibError> {
        if !stagecal_core::is_finite_point(p) {
            return Err(CalibError::PointOutOfRange { x: p.x, y: p.y });
        }
        let (col, col_next) = axis_indices(
            p.x - self.start_x,
            self.x_range,
            self.step_x,
            self.total_x_num,
        );
        let (row, row_next) = axis_indices(
            p.y - self.start_y,
            self.y_range,
            self.step_y,
            self.total_y_num,
        );
        Ok([
            self.flat_index(col, row),
            self.flat_index(col_next, row),
            self.flat_index(col, row_next),
            self.flat_index(col_next, row_next),
        ])
    }
}

/// Lower and upper lattice index along one axis for offset `d` from the start.
fn axis_indices(d: Real, range: Real, step: Real, total: usize) -> (usize, usize) {
    let last = total - 1;
    if d < 0.0 {
        return (0, 0);
    }
    if d > range {
        return (last, last);
    }
    // `as` saturates, and `d / step` is finite and non-negative here
    let lo = ((d / step).floor() as usize).min(last);
    let hi = lo.saturating_add(1).min(last);
    (lo, hi)
}

fn positive_count(name: &str, v: i64) -> Result<usize, CalibError> {
    if v < 1 {
        return Err(CalibError::load(format!("{name} must be at least 1, got {v}")));
    }
    usize::try_from(v)
        .map_err(|_| CalibError::load(format!("{name} = {v} does not fit in usize")))
}

fn checked_range(
    axis: &str,
    stored: Option<Real>,
    start: Real,
    end: Real,
) -> Result<Real, CalibError> {
    let derived = end - start;
    if derived < 0.0 {
        return Err(CalibError::load(format!(
            "{axis} end {end} lies before start {start}"
        )));
    }
    let Some(range) = stored else {
        return Ok(derived);
    };
    let tol = RANGE_REL_TOL * range.abs().max(derived.abs()).max(1.0);
    if !range.is_finite() || (range - derived).abs() > tol {
        return Err(CalibError::load(format!(
            "{axis}_range {range} disagrees with end − start = {derived}"
        )));
    }
    Ok(range)
}
