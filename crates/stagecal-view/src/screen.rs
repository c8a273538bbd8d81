use serde::{Deserialize, Serialize};
use stagecal_core::{Pt2, Real, Vec2};

/// Zoom and pan of a display surface: `screen = image · zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenTransform {
    pub zoom: Real,
    pub pan: Vec2,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ScreenTransform {
    pub fn new(zoom: Real, pan: Vec2) -> Self {
        Self { zoom, pan }
    }

    /// Zoom 1, no pan.
    pub fn identity() -> Self {
        Self::new(1.0, Vec2::zeros())
    }

    /// Image pixel to screen position.
    pub fn to_screen(&self, image: &Pt2) -> Pt2 {
        Pt2::from(image.coords * self.zoom + self.pan)
    }

    /// Screen position back to image pixel; `None` for a zero or non-finite
    /// zoom.
    pub fn to_image(&self, screen: &Pt2) -> Option<Pt2> {
        if self.zoom == 0.0 || !self.zoom.is_finite() {
            return None;
        }
        Some(Pt2::from((screen.coords - self.pan) / self.zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_roundtrip() {
        let view = ScreenTransform::new(2.5, Vec2::new(-40.0, 12.0));
        let p = Pt2::new(100.0, 50.0);
        let s = view.to_screen(&p);
        assert_eq!(s, Pt2::new(210.0, 137.0));
        assert_eq!(view.to_image(&s), Some(p));
    }

    #[test]
    fn zero_zoom_has_no_image_point() {
        let view = ScreenTransform::new(0.0, Vec2::zeros());
        assert_eq!(view.to_image(&Pt2::new(1.0, 1.0)), None);
    }
}
