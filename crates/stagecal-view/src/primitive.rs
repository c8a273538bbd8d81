//! Overlay primitives anchored in machine coordinates.
//!
//! A primitive is a batch of machine points plus a kind that tells the
//! renderer how to draw them. Before drawing, the batch is pushed through the
//! [`CoordinateTransformChain`] and dropped if none of it lands on screen.

use serde::{Deserialize, Serialize};
use stagecal_core::{Pt2, Real};

use crate::{CoordinateTransformChain, ScreenTransform};

/// Shape drawn for a primitive's point batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Dot,
    Rect,
    Line,
    Arc,
    Circle,
    FilledCircle,
    PolyLine,
    TextCircle,
    TextRect,
    Ellipse,
    Polygon,
    Cross,
    Arrow,
    Ring,
    Text,
}

impl PrimitiveKind {
    /// Kinds that are always drawn, whether or not a point is on screen.
    ///
    /// A line may cross the view with both ends outside it, and text is
    /// positioned by the renderer.
    pub fn is_unbounded(self) -> bool {
        matches!(self, PrimitiveKind::Line | PrimitiveKind::Text)
    }
}

/// Visible area `[0, width] × [0, height]` in screen units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBounds {
    pub width: Real,
    pub height: Real,
}

impl DisplayBounds {
    pub fn new(width: Real, height: Real) -> Self {
        Self { width, height }
    }

    /// Closed-interval containment.
    pub fn contains(&self, p: &Pt2) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

/// `true` if the batch should be drawn: unbounded kinds always, others when
/// at least one screen point lies inside `bounds`.
pub fn is_batch_visible(kind: PrimitiveKind, screen_points: &[Pt2], bounds: &DisplayBounds) -> bool {
    kind.is_unbounded() || screen_points.iter().any(|p| bounds.contains(p))
}

/// Map machine points to screen and keep them only if the batch is visible.
pub fn project_primitive(
    chain: &CoordinateTransformChain,
    kind: PrimitiveKind,
    points: &[Pt2],
    reference: Pt2,
    screen: ScreenTransform,
    bounds: &DisplayBounds,
) -> Option<Vec<Pt2>> {
    let projected: Vec<Pt2> = chain
        .transform_for_display(points, reference, screen)
        .collect();
    is_batch_visible(kind, &projected, bounds).then_some(projected)
}

/// Pair a flat `[x0, y0, x1, y1, …]` list into points; a trailing odd value
/// is ignored.
pub fn points_from_flat(coords: &[Real]) -> Vec<Pt2> {
    coords
        .chunks_exact(2)
        .map(|xy| Pt2::new(xy[0], xy[1]))
        .collect()
}

/// On-screen stroke width: `line_width · line_width_scale · zoom`, at least 1.
pub fn stroke_width(line_width: Real, line_width_scale: Real, zoom: Real) -> Real {
    (line_width * line_width_scale * zoom).max(1.0)
}

/// An overlay element in machine coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub points: Vec<Pt2>,
    /// Stroke width in machine millimetres.
    pub line_width: Real,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// A primitive ready to draw, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPrimitive {
    pub kind: PrimitiveKind,
    pub points: Vec<Pt2>,
    pub stroke_width: Real,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind, points: Vec<Pt2>, line_width: Real) -> Self {
        Self {
            kind,
            points,
            line_width,
            visible: true,
        }
    }

    /// Build from a flat coordinate list, see [`points_from_flat`].
    pub fn from_flat(kind: PrimitiveKind, coords: &[Real], line_width: Real) -> Self {
        Self::new(kind, points_from_flat(coords), line_width)
    }

    /// Screen-space form of this primitive, or `None` if hidden or off
    /// screen.
    pub fn project(
        &self,
        chain: &CoordinateTransformChain,
        reference: Pt2,
        screen: ScreenTransform,
        bounds: &DisplayBounds,
    ) -> Option<ProjectedPrimitive> {
        if !self.visible {
            return None;
        }
        let points = project_primitive(chain, self.kind, &self.points, reference, screen, bounds)?;
        Some(ProjectedPrimitive {
            kind: self.kind,
            points,
            stroke_width: stroke_width(self.line_width, chain.line_width_scale(), screen.zoom),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecal_core::Vec2;

    fn bounds() -> DisplayBounds {
        DisplayBounds::new(640.0, 480.0)
    }

    #[test]
    fn one_point_inside_is_enough() {
        let pts = [Pt2::new(-10.0, -10.0), Pt2::new(640.0, 480.0)];
        assert!(is_batch_visible(PrimitiveKind::Rect, &pts, &bounds()));
        assert!(!is_batch_visible(PrimitiveKind::Rect, &pts[..1], &bounds()));
    }

    #[test]
    fn lines_and_text_are_always_visible() {
        let off = [Pt2::new(-100.0, 50.0), Pt2::new(1000.0, 50.0)];
        assert!(is_batch_visible(PrimitiveKind::Line, &off, &bounds()));
        assert!(is_batch_visible(PrimitiveKind::Text, &off, &bounds()));
        assert!(!is_batch_visible(PrimitiveKind::PolyLine, &off, &bounds()));
        assert!(!is_batch_visible(PrimitiveKind::Dot, &[], &bounds()));
    }

    #[test]
    fn flat_list_pairs_up() {
        let pts = points_from_flat(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(pts, vec![Pt2::new(1.0, 2.0), Pt2::new(3.0, 4.0)]);
        assert!(points_from_flat(&[]).is_empty());
    }

    #[test]
    fn stroke_never_thinner_than_one_pixel() {
        assert_eq!(stroke_width(0.01, 50.0, 1.0), 1.0);
        assert_eq!(stroke_width(0.1, 50.0, 2.0), 10.0);
    }

    #[test]
    fn off_screen_primitive_is_dropped() {
        let mut chain = CoordinateTransformChain::new();
        chain.set_pixel_pitch(Vec2::new(0.1, 0.1), 640, 480).unwrap();
        let screen = ScreenTransform::identity();

        // 1 mm right of the reference lands 10 px right of the centre
        let near = Primitive::from_flat(PrimitiveKind::Cross, &[101.0, 50.0], 0.2);
        let shown = near
            .project(&chain, Pt2::new(100.0, 50.0), screen, &bounds())
            .unwrap();
        assert!((shown.points[0] - Pt2::new(330.0, 240.0)).norm() < 1e-9);
        assert!((shown.stroke_width - 2.0).abs() < 1e-9);

        let far = Primitive::from_flat(PrimitiveKind::Cross, &[500.0, 50.0], 0.2);
        assert!(far
            .project(&chain, Pt2::new(100.0, 50.0), screen, &bounds())
            .is_none());

        let mut hidden = near.clone();
        hidden.visible = false;
        assert!(hidden
            .project(&chain, Pt2::new(100.0, 50.0), screen, &bounds())
            .is_none());
    }

    #[test]
    fn kinds_use_snake_case() {
        let json = serde_json::to_string(&PrimitiveKind::FilledCircle).unwrap();
        assert_eq!(json, "\"filled_circle\"");
    }
}
