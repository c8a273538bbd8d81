//! Deterministic residual helpers for synthetic grids.
//!
//! The functions here avoid `thread_rng` and do not depend on the internal
//! algorithm of `rand` RNGs. This keeps synthetic datasets stable across
//! versions and platforms.

use crate::{Real, Vec2};

/// Deterministic uniform offset noise in `[-max_abs_mm, +max_abs_mm]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformOffsetNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute per-axis noise (millimetres).
    pub max_abs_mm: Real,
}

impl UniformOffsetNoise {
    /// Sample a deterministic 2D noise vector for a grid index.
    #[inline]
    pub fn sample(&self, grid_index: usize) -> Vec2 {
        let max_abs = self.max_abs_mm.abs();
        if max_abs == 0.0 {
            return Vec2::zeros();
        }

        let key = self.seed ^ (grid_index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        let u = u64_to_unit_f64(splitmix64(key));
        let v = u64_to_unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB));

        // Map [0, 1) -> [-max_abs, +max_abs].
        Vec2::new((u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs)
    }

    /// Add noise to every offset, keyed on its position in the slice.
    pub fn apply_all(&self, offsets: &mut [Vec2]) {
        for (idx, o) in offsets.iter_mut().enumerate() {
            *o += self.sample(idx);
        }
    }
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // top 53 bits -> [0, 1)
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}
