mod area;
mod simplify;

pub use area::{
    ellipse_area_mm2, path_length_px, perimeter_mm, polygon_area_mm2, polygon_area_px2,
    rectangle_area_mm2, segment_lengths_mm, volume_from_contours, volume_from_contours_simpson,
};
pub use hit_test::{hit_test, Hit, HitRegion};
pub use simplify::{chaikin_smooth, simplify_polyline};

use serde::{Deserialize, Serialize};

/// A coordinate in image pixel space. The image origin is top-left,
/// x grows along columns and y along rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Point2D {
        Point2D::new(self.x + dx, self.y + dy)
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Physical size of one pixel in millimeters. Row spacing scales y,
/// column spacing scales x. When a series carries no spacing every
/// physical-unit result is `None`; pixel values are never passed off as mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSpacing {
    pub row_spacing_mm: f64,
    pub column_spacing_mm: f64,
}

impl PixelSpacing {
    pub fn new(row_spacing_mm: f64, column_spacing_mm: f64) -> Self {
        PixelSpacing {
            row_spacing_mm,
            column_spacing_mm,
        }
    }

    pub fn isotropic(spacing_mm: f64) -> Self {
        PixelSpacing::new(spacing_mm, spacing_mm)
    }

    /// Maps a pixel-space point into millimeter space.
    pub fn scale(&self, p: &Point2D) -> Point2D {
        Point2D::new(p.x * self.column_spacing_mm, p.y * self.row_spacing_mm)
    }
}

pub fn distance(p1: &Point2D, p2: &Point2D) -> f64 {
    p1.distance_to(p2)
}

pub fn distance_mm(p1: &Point2D, p2: &Point2D, spacing: Option<&PixelSpacing>) -> Option<f64> {
    let spacing = spacing?;
    Some(spacing.scale(p1).distance_to(&spacing.scale(p2)))
}

/// Shortest distance from `p` to the segment `a`..`b`.
pub fn point_to_segment_distance(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return p.distance_to(a);
    }
    let t = ((p.x - a.x) * abx + (p.y - a.y) * aby) / len2;
    let t = t.clamp(0.0, 1.0);
    let proj = Point2D::new(a.x + t * abx, a.y + t * aby);
    p.distance_to(&proj)
}

/// Ray-casting point-in-polygon test. The polygon is treated as closed.
pub fn point_in_polygon(p: &Point2D, polygon: &[Point2D]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if ((pi.y > p.y) != (pj.y > p.y))
            && (p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Ellipse-equation containment test, with the ellipse rotated by
/// `rotation_rad` around its center.
pub fn point_in_ellipse(
    p: &Point2D,
    center: &Point2D,
    radius_x: f64,
    radius_y: f64,
    rotation_rad: f64,
) -> bool {
    if radius_x <= 0.0 || radius_y <= 0.0 {
        return false;
    }
    let (sin, cos) = rotation_rad.sin_cos();
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    // rotate the query point into the ellipse frame
    let local_x = dx * cos + dy * sin;
    let local_y = -dx * sin + dy * cos;
    let nx = local_x / radius_x;
    let ny = local_y / radius_y;
    nx * nx + ny * ny <= 1.0
}

/// Axis-aligned bounding box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point2D,
    pub max: Point2D,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

pub fn bounding_box(points: &[Point2D]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some(BoundingBox { min, max })
}

#[cfg(test)]
mod geometry_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_three_four_five() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_relative_eq!(a.distance_to(&b), 5.0);
        assert_relative_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn test_distance_mm_requires_spacing() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_eq!(distance_mm(&a, &b, None), None);
        let spacing = PixelSpacing::isotropic(1.0);
        assert_relative_eq!(distance_mm(&a, &b, Some(&spacing)).unwrap(), 5.0);
    }

    #[test]
    fn test_distance_mm_anisotropic() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(2.0, 0.0);
        let spacing = PixelSpacing::new(1.0, 0.5);
        assert_relative_eq!(distance_mm(&a, &b, Some(&spacing)).unwrap(), 1.0);
    }

    #[test]
    fn test_point_to_segment_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(10.0, 0.0);
        assert_relative_eq!(point_to_segment_distance(&Point2D::new(5.0, 3.0), &a, &b), 3.0);
        // beyond the endpoint the distance is to the endpoint itself
        assert_relative_eq!(
            point_to_segment_distance(&Point2D::new(13.0, 4.0), &a, &b),
            5.0
        );
        // degenerate segment
        assert_relative_eq!(point_to_segment_distance(&Point2D::new(3.0, 4.0), &a, &a), 5.0);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(4.0, 4.0),
            Point2D::new(0.0, 4.0),
        ];
        assert!(point_in_polygon(&Point2D::new(2.0, 2.0), &square));
        assert!(!point_in_polygon(&Point2D::new(5.0, 2.0), &square));
        assert!(!point_in_polygon(&Point2D::new(2.0, 2.0), &square[..2]));
    }

    #[test]
    fn test_point_in_ellipse_rotated() {
        let center = Point2D::new(0.0, 0.0);
        // a long flat ellipse rotated 90 degrees stands upright
        let rot = std::f64::consts::FRAC_PI_2;
        assert!(point_in_ellipse(&Point2D::new(0.0, 4.0), &center, 5.0, 1.0, rot));
        assert!(!point_in_ellipse(&Point2D::new(4.0, 0.0), &center, 5.0, 1.0, rot));
    }

    #[test]
    fn test_bounding_box() {
        let points = vec![
            Point2D::new(1.0, 5.0),
            Point2D::new(-2.0, 3.0),
            Point2D::new(4.0, -1.0),
        ];
        let bbox = bounding_box(&points).unwrap();
        assert_relative_eq!(bbox.min.x, -2.0);
        assert_relative_eq!(bbox.min.y, -1.0);
        assert_relative_eq!(bbox.max.x, 4.0);
        assert_relative_eq!(bbox.max.y, 5.0);
        assert_relative_eq!(bbox.width(), 6.0);
        assert_relative_eq!(bbox.height(), 6.0);
        assert!(bbox.contains(&Point2D::new(0.0, 0.0)));
        assert!(!bbox.contains(&Point2D::new(10.0, 0.0)));
        assert!(bounding_box(&[]).is_none());
    }
}
