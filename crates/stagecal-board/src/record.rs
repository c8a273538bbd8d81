//! JSON form of a board calibration.

use serde::{Deserialize, Serialize};
use stagecal_core::{CalibError, Real};

/// One `(index, x, y)` entry of a vision-offset or shot-position list.
///
/// Accepted on input as `[index, x, y]`, `{"index": .., "x": .., "y": ..}` or
/// the legacy `{"Item1": .., "Item2": .., "Item3": ..}` object. Always written
/// in the named form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexedPointRepr")]
pub struct IndexedPoint {
    /// Flat grid index, `col + row * total_x_num`. Signed so that a negative
    /// index in a file is reported instead of failing to parse.
    pub index: i64,
    pub x: Real,
    pub y: Real,
}

impl IndexedPoint {
    pub fn new(index: i64, x: Real, y: Real) -> Self {
        Self { index, x, y }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexedPointRepr {
    Triple(i64, Real, Real),
    Named {
        index: i64,
        x: Real,
        y: Real,
    },
    Tuple {
        #[serde(rename = "Item1")]
        item1: i64,
        #[serde(rename = "Item2")]
        item2: Real,
        #[serde(rename = "Item3")]
        item3: Real,
    },
}

impl From<IndexedPointRepr> for IndexedPoint {
    fn from(repr: IndexedPointRepr) -> Self {
        match repr {
            IndexedPointRepr::Triple(index, x, y) | IndexedPointRepr::Named { index, x, y } => {
                Self { index, x, y }
            }
            IndexedPointRepr::Tuple {
                item1,
                item2,
                item3,
            } => Self {
                index: item1,
                x: item2,
                y: item3,
            },
        }
    }
}

/// Serialized board calibration: lattice geometry plus the per-index vision
/// offsets and shot positions, all in stage millimetres.
///
/// `x_range`/`y_range` are optional on input; when absent they are derived
/// from `end − start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCalibRecord {
    #[serde(alias = "m_dStartX")]
    pub start_x: Real,
    #[serde(alias = "m_dStartY")]
    pub start_y: Real,
    #[serde(alias = "m_dStepX")]
    pub step_x: Real,
    #[serde(alias = "m_dStepY")]
    pub step_y: Real,
    #[serde(alias = "m_dEndX")]
    pub end_x: Real,
    #[serde(alias = "m_dEndY")]
    pub end_y: Real,
    #[serde(alias = "m_dXRange", default, skip_serializing_if = "Option::is_none")]
    pub x_range: Option<Real>,
    #[serde(alias = "m_dYRange", default, skip_serializing_if = "Option::is_none")]
    pub y_range: Option<Real>,
    #[serde(alias = "m_iTotalXNum")]
    pub total_x_num: i64,
    #[serde(alias = "m_iTotalYNum")]
    pub total_y_num: i64,
    /// Motion pattern used while acquiring; carried through untouched.
    #[serde(alias = "m_MovType", default)]
    pub mov_type: i32,
    /// Camera-measured offset of each mark from the view centre.
    #[serde(alias = "m_VisionResultMap")]
    pub vision_offsets: Vec<IndexedPoint>,
    /// Stage position at which each index was shot.
    #[serde(alias = "m_IndexShotPosMap")]
    pub shot_positions: Vec<IndexedPoint>,
}

impl BoardCalibRecord {
    /// Parse a record from JSON text.
    ///
    /// # Errors
    ///
    /// [`CalibError::Load`] on malformed JSON or missing fields.
    pub fn from_json_str(json: &str) -> Result<Self, CalibError> {
        serde_json::from_str(json).map_err(CalibError::load)
    }

    /// Pretty JSON text in the native field names.
    ///
    /// # Errors
    ///
    /// [`CalibError::Save`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, CalibError> {
        serde_json::to_string_pretty(self).map_err(|e| CalibError::Save(e.to_string()))
    }
}
