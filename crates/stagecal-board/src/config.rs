use serde::{Deserialize, Serialize};

/// Options applied when a board calibration is loaded for use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardCalibConfig {
    /// Force the fitted axis scales `a` and `e` to 1 during normalization.
    pub lock_scale: bool,
    /// Run angle normalization right after loading.
    pub normalize_on_load: bool,
}

impl Default for BoardCalibConfig {
    fn default() -> Self {
        Self {
            lock_scale: false,
            normalize_on_load: true,
        }
    }
}
