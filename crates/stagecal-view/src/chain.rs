use std::cell::OnceCell;

use log::debug;
use stagecal_core::{AffineMatrix, CalibError, Pt2, Real, Vec2};
use stagecal_linear::{pitch_grid_correspondences, AffineSolver};

use crate::ScreenTransform;

/// Machine-millimetre to image-pixel mapping `M` used by a display.
///
/// `M` starts as the identity. It changes only through the three setters,
/// each of which either replaces `M` (and drops the cached inverse) or fails
/// without touching anything.
#[derive(Debug, Clone)]
pub struct CoordinateTransformChain {
    mm_to_pixel: AffineMatrix,
    line_width_scale: Real,
    inverse: OnceCell<AffineMatrix>,
}

impl Default for CoordinateTransformChain {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateTransformChain {
    pub fn new() -> Self {
        Self {
            mm_to_pixel: AffineMatrix::identity(),
            line_width_scale: 1.0,
            inverse: OnceCell::new(),
        }
    }

    /// Current machine → pixel matrix.
    pub fn matrix(&self) -> &AffineMatrix {
        &self.mm_to_pixel
    }

    /// Pixels per machine millimetre along x, `‖M·(1,0) − M·(0,0)‖`.
    pub fn line_width_scale(&self) -> Real {
        self.line_width_scale
    }

    /// Install a pixel → mm calibration; `M` becomes its inverse.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] if `pixel_to_mm` is not invertible.
    pub fn set_pixel_to_mm(&mut self, pixel_to_mm: &AffineMatrix) -> Result<(), CalibError> {
        let m = pixel_to_mm.try_inverse()?;
        self.replace(m, *pixel_to_mm);
        Ok(())
    }

    /// Install a mm → pixel calibration directly.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] if `mm_to_pixel` is not invertible; the
    /// previous matrix stays in place.
    pub fn set_mm_to_pixel(&mut self, mm_to_pixel: &AffineMatrix) -> Result<(), CalibError> {
        let inv = mm_to_pixel.try_inverse()?;
        self.replace(*mm_to_pixel, inv);
        Ok(())
    }

    /// Calibrate from a pixel pitch (mm per pixel) for an image of
    /// `width × height` pixels, with the stage origin at the image centre.
    ///
    /// # Errors
    ///
    /// - [`CalibError::InvalidPitch`] for a zero or non-finite pitch.
    /// - [`CalibError::SingularSystem`] / [`CalibError::SingularMatrix`] if
    ///   the synthesized grid does not yield an invertible transform.
    pub fn set_pixel_pitch(
        &mut self,
        pitch: Vec2,
        width: u32,
        height: u32,
    ) -> Result<(), CalibError> {
        let (mm, px) = pitch_grid_correspondences(pitch, width, height)?;
        let m = AffineSolver::fit_grid9(&mm, &px)?.to_matrix();
        let inv = m.try_inverse()?;
        self.replace(m, inv);
        Ok(())
    }

    /// Lazily map machine points to screen positions:
    /// `(M · (p − reference)) · zoom + pan`.
    pub fn transform_for_display<'a>(
        &'a self,
        points: &'a [Pt2],
        reference: Pt2,
        screen: ScreenTransform,
    ) -> impl Iterator<Item = Pt2> + 'a {
        points
            .iter()
            .map(move |p| screen.to_screen(&self.project(p, &reference)))
    }

    /// Machine point to image pixel, `M · (mach − reference)`.
    pub fn project(&self, mach: &Pt2, reference: &Pt2) -> Pt2 {
        self.mm_to_pixel.apply(&Pt2::from(mach - reference))
    }

    /// Image pixel to machine point, `M⁻¹ · pixel + reference`.
    ///
    /// # Errors
    ///
    /// [`CalibError::SingularMatrix`] if `M` has no inverse (cannot happen
    /// through the setters).
    pub fn inverse_transform(&self, pixel: &Pt2, reference: &Pt2) -> Result<Pt2, CalibError> {
        Ok(self.inverse()?.apply(pixel) + reference.coords)
    }

    /// Screen position to machine point via `screen`'s zoom and pan.
    ///
    /// Returns `Ok(None)` when the zoom cannot be undone.
    pub fn screen_to_machine(
        &self,
        screen_pos: &Pt2,
        reference: &Pt2,
        screen: &ScreenTransform,
    ) -> Result<Option<Pt2>, CalibError> {
        screen
            .to_image(screen_pos)
            .map(|px| self.inverse_transform(&px, reference))
            .transpose()
    }

    fn inverse(&self) -> Result<&AffineMatrix, CalibError> {
        if let Some(inv) = self.inverse.get() {
            return Ok(inv);
        }
        let inv = self.mm_to_pixel.try_inverse()?;
        Ok(self.inverse.get_or_init(|| inv))
    }

    fn replace(&mut self, m: AffineMatrix, inv: AffineMatrix) {
        self.line_width_scale = m.unit_x_length();
        self.mm_to_pixel = m;
        self.inverse = OnceCell::from(inv);
        debug!(
            "mm → pixel matrix set to {:?}, line width scale {:.4}",
            m.to_row_array(),
            self.line_width_scale
        );
    }
}
