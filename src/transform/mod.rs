use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;

/// Maps between screen (viewport) coordinates and image pixel coordinates
/// for a given zoom, pan and rotation. The image is fitted into the
/// viewport at zoom 1 and rotated around its own center; pan is applied in
/// screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub viewport_w: f64,
    pub viewport_h: f64,
    pub image_cols: u32,
    pub image_rows: u32,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub rotation_deg: f64,
}

impl Transformer {
    pub fn new(viewport_w: f64, viewport_h: f64, image_cols: u32, image_rows: u32) -> Self {
        Transformer {
            viewport_w,
            viewport_h,
            image_cols,
            image_rows,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            rotation_deg: 0.0,
        }
    }

    /// Scale that letterboxes the full image into the viewport.
    pub fn base_scale(&self) -> f64 {
        let sx = self.viewport_w / self.image_cols as f64;
        let sy = self.viewport_h / self.image_rows as f64;
        sx.min(sy)
    }

    pub fn effective_scale(&self) -> f64 {
        self.base_scale() * self.zoom
    }

    /// Rotation with exact fast paths for the four axis-aligned angles, so
    /// repeated 90-degree rotations accumulate no trigonometric error.
    fn rotate(&self, v: Vector2<f64>, inverse: bool) -> Vector2<f64> {
        let deg = self.rotation_deg.rem_euclid(360.0);
        let quarter = match deg {
            d if d == 0.0 => Some(0),
            d if d == 90.0 => Some(1),
            d if d == 180.0 => Some(2),
            d if d == 270.0 => Some(3),
            _ => None,
        };
        if let Some(q) = quarter {
            let q = if inverse { (4 - q) % 4 } else { q };
            return match q {
                0 => v,
                1 => Vector2::new(-v.y, v.x),
                2 => Vector2::new(-v.x, -v.y),
                _ => Vector2::new(v.y, -v.x),
            };
        }
        let angle = deg.to_radians();
        let rotation = Rotation2::new(if inverse { -angle } else { angle });
        rotation * v
    }

    /// Screen point to image pixel coordinates: undo pan, undo scale,
    /// rotate by the negative angle, re-center to the image top-left origin.
    pub fn screen_to_image(&self, screen: &Point2D) -> Point2D {
        let centered = Vector2::new(
            screen.x - self.viewport_w / 2.0 - self.pan_x,
            screen.y - self.viewport_h / 2.0 - self.pan_y,
        );
        let unscaled = centered / self.effective_scale();
        let unrotated = self.rotate(unscaled, true);
        Point2D::new(
            unrotated.x + self.image_cols as f64 / 2.0,
            unrotated.y + self.image_rows as f64 / 2.0,
        )
    }

    /// Exact inverse chain of `screen_to_image`.
    pub fn image_to_screen(&self, image: &Point2D) -> Point2D {
        let centered = Vector2::new(
            image.x - self.image_cols as f64 / 2.0,
            image.y - self.image_rows as f64 / 2.0,
        );
        let rotated = self.rotate(centered, false);
        let scaled = rotated * self.effective_scale();
        Point2D::new(
            scaled.x + self.viewport_w / 2.0 + self.pan_x,
            scaled.y + self.viewport_h / 2.0 + self.pan_y,
        )
    }

    /// Maximum pan per axis: half the excess of the rotated image bounding
    /// box over the viewport, never negative.
    pub fn pan_bounds(&self) -> (f64, f64) {
        let half_w = self.image_cols as f64 / 2.0;
        let half_h = self.image_rows as f64 / 2.0;
        let corners = [
            Vector2::new(-half_w, -half_h),
            Vector2::new(half_w, -half_h),
            Vector2::new(half_w, half_h),
            Vector2::new(-half_w, half_h),
        ];
        let scale = self.effective_scale();
        let mut max_x: f64 = 0.0;
        let mut max_y: f64 = 0.0;
        for corner in corners {
            let rotated = self.rotate(corner, false) * scale;
            max_x = max_x.max(rotated.x.abs());
            max_y = max_y.max(rotated.y.abs());
        }
        let bound_x = (max_x * 2.0 - self.viewport_w) / 2.0;
        let bound_y = (max_y * 2.0 - self.viewport_h) / 2.0;
        (bound_x.max(0.0), bound_y.max(0.0))
    }

    pub fn clamp_pan(&mut self) {
        let (bx, by) = self.pan_bounds();
        self.pan_x = self.pan_x.clamp(-bx, bx);
        self.pan_y = self.pan_y.clamp(-by, by);
    }

    /// Changes zoom while keeping the image point under `screen_anchor`
    /// fixed, then clamps the resulting pan to the pan bounds.
    pub fn zoom_at_point(&mut self, screen_anchor: &Point2D, new_zoom: f64) {
        let anchor_image = self.screen_to_image(screen_anchor);
        self.zoom = new_zoom;
        // choose the pan that puts anchor_image back under the anchor
        let centered = Vector2::new(
            anchor_image.x - self.image_cols as f64 / 2.0,
            anchor_image.y - self.image_rows as f64 / 2.0,
        );
        let projected = self.rotate(centered, false) * self.effective_scale();
        self.pan_x = screen_anchor.x - self.viewport_w / 2.0 - projected.x;
        self.pan_y = screen_anchor.y - self.viewport_h / 2.0 - projected.y;
        self.clamp_pan();
    }
}

#[cfg(test)]
mod transform_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transformer() -> Transformer {
        Transformer::new(800.0, 600.0, 512, 512)
    }

    #[test]
    fn test_base_scale_letterboxes() {
        let t = transformer();
        assert_relative_eq!(t.base_scale(), 600.0 / 512.0);
    }

    #[test]
    fn test_image_center_maps_to_viewport_center() {
        let t = transformer();
        let screen = t.image_to_screen(&Point2D::new(256.0, 256.0));
        assert_relative_eq!(screen.x, 400.0);
        assert_relative_eq!(screen.y, 300.0);
    }

    #[test]
    fn test_round_trip_with_zoom_pan_rotation() {
        let mut t = transformer();
        t.zoom = 2.5;
        t.pan_x = 40.0;
        t.pan_y = -25.0;
        t.rotation_deg = 33.0;
        let image = Point2D::new(123.4, 456.7);
        let back = t.screen_to_image(&t.image_to_screen(&image));
        assert_relative_eq!(back.x, image.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, image.y, epsilon = 1e-9);
    }

    #[test]
    fn test_quarter_rotation_is_exact() {
        let mut t = transformer();
        t.rotation_deg = 90.0;
        // the point one pixel right of center ends up exactly one scaled
        // pixel below center, with no trigonometric rounding
        let screen = t.image_to_screen(&Point2D::new(257.0, 256.0));
        assert_eq!(screen.x, 400.0);
        assert_eq!(screen.y, 300.0 + t.effective_scale());
    }

    #[test]
    fn test_pan_bounds_zero_when_image_fits() {
        let t = transformer();
        // at zoom 1 the letterboxed image never exceeds the viewport
        let (bx, by) = t.pan_bounds();
        assert_relative_eq!(bx, 0.0);
        assert_relative_eq!(by, 0.0);
    }

    #[test]
    fn test_pan_bounds_grow_with_zoom() {
        let mut t = transformer();
        t.zoom = 3.0;
        let (bx, by) = t.pan_bounds();
        let scaled = 512.0 * t.base_scale() * 3.0;
        assert_relative_eq!(bx, (scaled - 800.0) / 2.0);
        assert_relative_eq!(by, (scaled - 600.0) / 2.0);
    }

    #[test]
    fn test_zoom_at_point_keeps_anchor_fixed() {
        let mut t = transformer();
        t.zoom = 2.0;
        let anchor = Point2D::new(500.0, 200.0);
        let before = t.screen_to_image(&anchor);
        t.zoom_at_point(&anchor, 3.0);
        // bounds do not bite here, so the anchor must stay put exactly
        let after = t.screen_to_image(&anchor);
        assert_relative_eq!(before.x, after.x, epsilon = 1e-9);
        assert_relative_eq!(before.y, after.y, epsilon = 1e-9);
    }

    #[test]
    fn test_zoom_at_point_clamps_to_bounds() {
        let mut t = transformer();
        // anchor at the far corner forces a pan beyond the legal bound
        t.zoom_at_point(&Point2D::new(0.0, 0.0), 1.5);
        let (bx, by) = t.pan_bounds();
        assert!(t.pan_x.abs() <= bx + 1e-9);
        assert!(t.pan_y.abs() <= by + 1e-9);
    }
}
