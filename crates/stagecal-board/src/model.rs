use std::{collections::BTreeMap, path::Path};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use stagecal_core::{AffineParams, CalibError, Pt2, Real, Vec2};
use stagecal_linear::AffineSolver;

use crate::{BoardCalibConfig, BoardCalibRecord, CalibrationGrid, IndexedPoint};

/// Upper bound applied to an interpolation fraction that exceeds 1.
const MAX_FRACTION: Real = 0.999;

/// Magnitude statistics of the stored vision offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    /// Root-mean-square offset length (mm).
    pub rms: Real,
    /// Largest offset length (mm).
    pub max: Real,
    /// Grid index of the largest offset.
    pub max_index: usize,
}

/// Board calibration: lattice geometry plus a vision offset and a shot
/// position for every grid index.
///
/// Offsets and positions are stored densely, indexed by flat grid index.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardCalibModel {
    grid: CalibrationGrid,
    vision: Vec<Vec2>,
    shots: Vec<Pt2>,
}

impl BoardCalibModel {
    /// Validate a record and build the model.
    ///
    /// Later entries with an index already seen overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// [`CalibError::Load`] for invalid geometry, an index outside
    /// `[0, cells)` or an index missing from either list.
    pub fn from_record(record: &BoardCalibRecord) -> Result<Self, CalibError> {
        let grid = CalibrationGrid::from_record(record)?;
        let cells = grid.cells();
        let vision = dense_by_index("vision offset", &record.vision_offsets, cells)?
            .into_iter()
            .map(|(x, y)| Vec2::new(x, y))
            .collect();
        let shots = dense_by_index("shot position", &record.shot_positions, cells)?
            .into_iter()
            .map(|(x, y)| Pt2::new(x, y))
            .collect();
        debug!(
            "board calibration: {}×{} cells, step ({}, {}) mm",
            grid.total_x_num(),
            grid.total_y_num(),
            grid.step_x(),
            grid.step_y()
        );
        Ok(Self {
            grid,
            vision,
            shots,
        })
    }

    /// Parse and validate a JSON record.
    pub fn from_json_str(json: &str) -> Result<Self, CalibError> {
        Self::from_record(&BoardCalibRecord::from_json_str(json)?)
    }

    /// Read and validate a JSON record file.
    ///
    /// # Errors
    ///
    /// [`CalibError::Load`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CalibError::load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// [`load`](Self::load), then normalize if `config.normalize_on_load`.
    pub fn load_with_config(
        path: impl AsRef<Path>,
        config: &BoardCalibConfig,
    ) -> Result<Self, CalibError> {
        let mut model = Self::load(path)?;
        if config.normalize_on_load {
            model.angle_normalization(config.lock_scale)?;
        }
        Ok(model)
    }

    /// Replace this model with the contents of `path`.
    ///
    /// On failure the current state is kept.
    pub fn reload(&mut self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        *self = Self::load(path)?;
        Ok(())
    }

    pub fn grid(&self) -> &CalibrationGrid {
        &self.grid
    }

    /// Vision offsets by flat grid index.
    pub fn vision_offsets(&self) -> &[Vec2] {
        &self.vision
    }

    /// Shot positions by flat grid index.
    pub fn shot_positions(&self) -> &[Pt2] {
        &self.shots
    }

    /// Fit the global transform from observed to commanded positions and
    /// remove it from the vision offsets.
    ///
    /// For each index the observed position is `shot + offset` and the target
    /// is `shot`. With `lock_scale` the fitted `a` and `e` are replaced by 1
    /// before the offsets are recomputed as `T(shot + offset) − shot`.
    ///
    /// # Errors
    ///
    /// Fit errors from [`AffineSolver::fit`]; the offsets are left unchanged.
    pub fn angle_normalization(&mut self, lock_scale: bool) -> Result<AffineParams, CalibError> {
        let observed: Vec<Pt2> = self
            .shots
            .iter()
            .zip(&self.vision)
            .map(|(s, o)| s + o)
            .collect();

        let fitted = AffineSolver::fit(&observed, &self.shots)?;
        let params = if lock_scale {
            fitted.with_unit_scale()
        } else {
            fitted
        };

        for ((offset, obs), shot) in self.vision.iter_mut().zip(&observed).zip(&self.shots) {
            *offset = params.apply(obs) - shot;
        }
        debug!(
            "angle normalization (lock_scale = {lock_scale}): {:?}, residual rms {:.6} mm",
            params.coeffs(),
            self.residual_summary().rms
        );
        Ok(params)
    }

    /// Interpolated board offset at stage position `point`.
    ///
    /// The four surrounding cells are blended with weights taken from the
    /// distance to the next column's shot x (`s0y`) and the next row's shot y
    /// (`s0x`), each divided by the step and capped at `0.999` when above 1:
    ///
    /// ```text
    /// s0y·(s0x·p0 + (1−s0x)·p2) + (1−s0y)·(s0x·p1 + (1−s0x)·p3)
    /// ```
    ///
    /// # Errors
    ///
    /// - [`CalibError::PointOutOfRange`] for a non-finite point.
    /// - [`CalibError::MissingGridData`] if a surrounding cell has no data.
    pub fn mach_to_board_coord(&self, point: &Pt2) -> Result<Vec2, CalibError> {
        let [i0, i1, i2, i3] = self.grid.neighbour_indices(point)?;

        let s0y = cap_fraction((self.shot(i1)?.x - point.x).abs() / self.grid.step_x());
        let s0x = cap_fraction((self.shot(i2)?.y - point.y).abs() / self.grid.step_y());

        let p0 = self.offset(i0)?;
        let p1 = self.offset(i1)?;
        let p2 = self.offset(i2)?;
        let p3 = self.offset(i3)?;

        Ok((p0 * s0x + p2 * (1.0 - s0x)) * s0y + (p1 * s0x + p3 * (1.0 - s0x)) * (1.0 - s0y))
    }

    /// Board-corrected position `point + mach_to_board_coord(point)`.
    pub fn to_board_frame(&self, point: &Pt2) -> Result<Pt2, CalibError> {
        Ok(point + self.mach_to_board_coord(point)?)
    }

    /// Length statistics of the current vision offsets.
    pub fn residual_summary(&self) -> ResidualSummary {
        let mut sum_sq = 0.0;
        let mut max = 0.0;
        let mut max_index = 0;
        for (idx, o) in self.vision.iter().enumerate() {
            let n = o.norm();
            sum_sq += n * n;
            if n > max {
                max = n;
                max_index = idx;
            }
        }
        ResidualSummary {
            rms: (sum_sq / self.vision.len() as Real).sqrt(),
            max,
            max_index,
        }
    }

    /// Record holding the current (possibly normalized) state.
    pub fn to_record(&self) -> BoardCalibRecord {
        let start = self.grid.start();
        let end = self.grid.end();
        BoardCalibRecord {
            start_x: start.x,
            start_y: start.y,
            step_x: self.grid.step_x(),
            step_y: self.grid.step_y(),
            end_x: end.x,
            end_y: end.y,
            x_range: Some(self.grid.x_range()),
            y_range: Some(self.grid.y_range()),
            total_x_num: self.grid.total_x_num() as i64,
            total_y_num: self.grid.total_y_num() as i64,
            mov_type: self.grid.mov_type(),
            vision_offsets: indexed(self.vision.iter().map(|v| (v.x, v.y))),
            shot_positions: indexed(self.shots.iter().map(|p| (p.x, p.y))),
        }
    }

    /// Write [`to_record`](Self::to_record) as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`CalibError::Save`] if the file cannot be written.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let path = path.as_ref();
        let json = self.to_record().to_json_string()?;
        std::fs::write(path, json)
            .map_err(|e| CalibError::Save(format!("{}: {e}", path.display())))
    }

    fn shot(&self, idx: usize) -> Result<&Pt2, CalibError> {
        self.shots.get(idx).ok_or(CalibError::MissingGridData(idx))
    }

    fn offset(&self, idx: usize) -> Result<Vec2, CalibError> {
        self.vision
            .get(idx)
            .copied()
            .ok_or(CalibError::MissingGridData(idx))
    }
}

fn cap_fraction(s: Real) -> Real {
    if s > 1.0 {
        MAX_FRACTION
    } else {
        s
    }
}

/// Spread `(index, x, y)` entries into a slot per cell.
///
/// Entries are gathered by index before anything is sized by `cells`, so a
/// header claiming more cells than the lists cover fails on the first hole.
fn dense_by_index(
    what: &str,
    entries: &[IndexedPoint],
    cells: usize,
) -> Result<Vec<(Real, Real)>, CalibError> {
    let mut slots: BTreeMap<usize, (Real, Real)> = BTreeMap::new();
    for entry in entries {
        let idx = usize::try_from(entry.index)
            .ok()
            .filter(|&i| i < cells)
            .ok_or_else(|| {
                CalibError::load(format!(
                    "{what} index {} outside [0, {cells})",
                    entry.index
                ))
            })?;
        if !(entry.x.is_finite() && entry.y.is_finite()) {
            return Err(CalibError::load(format!(
                "{what} at index {idx} is not finite"
            )));
        }
        if slots.insert(idx, (entry.x, entry.y)).is_some() {
            warn!("duplicate {what} for index {idx}; keeping the later entry");
        }
    }
    if let Some(idx) = (0..cells).find(|i| !slots.contains_key(i)) {
        return Err(CalibError::load(format!("no {what} for grid index {idx}")));
    }
    Ok(slots.into_values().collect())
}

fn indexed(values: impl Iterator<Item = (Real, Real)>) -> Vec<IndexedPoint> {
    values
        .enumerate()
        .map(|(idx, (x, y))| IndexedPoint::new(idx as i64, x, y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_2x2(offsets: [(Real, Real); 4]) -> BoardCalibModel {
        let record = BoardCalibRecord {
            start_x: 0.0,
            start_y: 0.0,
            step_x: 10.0,
            step_y: 10.0,
            end_x: 10.0,
            end_y: 10.0,
            x_range: Some(10.0),
            y_range: Some(10.0),
            total_x_num: 2,
            total_y_num: 2,
            mov_type: 0,
            vision_offsets: offsets
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| IndexedPoint::new(i as i64, x, y))
                .collect(),
            shot_positions: vec![
                IndexedPoint::new(0, 0.0, 0.0),
                IndexedPoint::new(1, 10.0, 0.0),
                IndexedPoint::new(2, 0.0, 10.0),
                IndexedPoint::new(3, 10.0, 10.0),
            ],
        };
        BoardCalibModel::from_record(&record).unwrap()
    }

    #[test]
    fn zero_offsets_give_zero() {
        let model = square_2x2([(0.0, 0.0); 4]);
        assert_eq!(
            model.mach_to_board_coord(&Pt2::new(5.0, 5.0)).unwrap(),
            Vec2::zeros()
        );
    }

    #[test]
    fn single_offset_blends_by_area() {
        let model = square_2x2([(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (2.0, 0.0)]);
        assert_eq!(
            model.mach_to_board_coord(&Pt2::new(10.0, 10.0)).unwrap(),
            Vec2::new(2.0, 0.0)
        );
        assert_eq!(
            model.mach_to_board_coord(&Pt2::new(5.0, 5.0)).unwrap(),
            Vec2::new(0.5, 0.0)
        );
    }

    #[test]
    fn corners_are_exact() {
        let offsets = [(0.1, -0.2), (0.3, 0.05), (-0.4, 0.25), (0.7, -0.6)];
        let model = square_2x2(offsets);
        for (shot, expected) in model.shot_positions().iter().zip(offsets) {
            assert_eq!(
                model.mach_to_board_coord(shot).unwrap(),
                Vec2::new(expected.0, expected.1),
                "at {shot}"
            );
        }
    }

    #[test]
    fn far_outside_stays_on_boundary_cells() {
        let model = square_2x2([(1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        let off = model.mach_to_board_coord(&Pt2::new(-500.0, -500.0)).unwrap();
        assert_relative_eq!(off, Vec2::new(1.0, 0.0), epsilon = 1e-12);
        let off = model.mach_to_board_coord(&Pt2::new(500.0, 500.0)).unwrap();
        assert_relative_eq!(off, Vec2::new(4.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn non_finite_query_is_rejected() {
        let model = square_2x2([(0.0, 0.0); 4]);
        let err = model
            .mach_to_board_coord(&Pt2::new(0.0, Real::INFINITY))
            .unwrap_err();
        assert_eq!(err.status_code().code(), -2);
    }

    #[test]
    fn board_frame_adds_offset() {
        let model = square_2x2([(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (2.0, 0.0)]);
        assert_eq!(
            model.to_board_frame(&Pt2::new(5.0, 5.0)).unwrap(),
            Pt2::new(5.5, 5.0)
        );
    }

    #[test]
    fn residual_summary_finds_largest() {
        let model = square_2x2([(0.0, 0.0), (3.0, 4.0), (0.0, 0.0), (0.0, 0.0)]);
        let summary = model.residual_summary();
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.max_index, 1);
        assert_relative_eq!(summary.rms, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn pure_translation_offsets_vanish_after_normalization() {
        let mut model = square_2x2([(0.2, -0.1); 4]);
        let params = model.angle_normalization(false).unwrap();
        assert_relative_eq!(params.c(), -0.2, epsilon = 1e-9);
        assert_relative_eq!(params.f(), 0.1, epsilon = 1e-9);
        assert!(model.residual_summary().max < 1e-9);
    }

    #[test]
    fn lock_scale_forces_unit_diagonal() {
        // observed grid is 1 % larger than commanded
        let mut model = square_2x2([(0.0, 0.0), (0.1, 0.0), (0.0, 0.1), (0.1, 0.1)]);
        let free = model.clone().angle_normalization(false).unwrap();
        assert!((free.a() - 1.0).abs() > 1e-3);

        let locked = model.angle_normalization(true).unwrap();
        assert_eq!(locked.a(), 1.0);
        assert_eq!(locked.e(), 1.0);
        // offsets reflect the locked transform
        let expected = locked.apply(&Pt2::new(10.1, 0.0)) - Pt2::new(10.0, 0.0);
        assert_relative_eq!(model.vision_offsets()[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn holes_and_bad_indices_are_load_errors() {
        let mut record = square_2x2([(0.0, 0.0); 4]).to_record();
        record.vision_offsets.pop();
        let err = BoardCalibModel::from_record(&record).unwrap_err();
        assert!(err.to_string().contains("grid index 3"));

        let mut record = square_2x2([(0.0, 0.0); 4]).to_record();
        record.shot_positions[0].index = -1;
        assert!(matches!(
            BoardCalibModel::from_record(&record),
            Err(CalibError::Load(_))
        ));

        let mut record = square_2x2([(0.0, 0.0); 4]).to_record();
        record.shot_positions[0].index = 4;
        assert!(BoardCalibModel::from_record(&record).is_err());
    }

    #[test]
    fn oversized_header_is_a_load_error() {
        let mut record = square_2x2([(0.0, 0.0); 4]).to_record();
        record.total_x_num = 4_000_000;
        record.total_y_num = 4_000_000;
        record.end_x = 3_999_999.0 * 10.0;
        record.end_y = 3_999_999.0 * 10.0;
        record.x_range = None;
        record.y_range = None;
        record.vision_offsets.truncate(1);
        record.shot_positions.truncate(1);

        let err = BoardCalibModel::from_record(&record).unwrap_err();
        assert!(matches!(err, CalibError::Load(_)));
        assert!(err.to_string().contains("grid index 1"), "{err}");
    }

    #[test]
    fn failed_normalization_leaves_offsets_alone() {
        let record = BoardCalibRecord {
            start_x: 5.0,
            start_y: 5.0,
            step_x: 10.0,
            step_y: 10.0,
            end_x: 5.0,
            end_y: 5.0,
            x_range: None,
            y_range: None,
            total_x_num: 1,
            total_y_num: 1,
            mov_type: 0,
            vision_offsets: vec![IndexedPoint::new(0, 0.3, -0.2)],
            shot_positions: vec![IndexedPoint::new(0, 5.0, 5.0)],
        };
        let mut model = BoardCalibModel::from_record(&record).unwrap();
        let before = model.clone();

        let err = model.angle_normalization(false).unwrap_err();
        assert!(matches!(err, CalibError::SingularSystem { .. }));
        assert_eq!(model.vision_offsets(), before.vision_offsets());
        assert_eq!(model, before);
    }

    #[test]
    fn duplicate_index_keeps_later_entry() {
        let mut record = square_2x2([(0.0, 0.0); 4]).to_record();
        record.vision_offsets.push(IndexedPoint::new(2, 9.0, 9.0));
        let model = BoardCalibModel::from_record(&record).unwrap();
        assert_eq!(model.vision_offsets()[2], Vec2::new(9.0, 9.0));
    }
}
