use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::{distance_mm, PixelSpacing, Point2D};

/// Shoelace area of a closed polygon in squared pixels.
/// Returns `None` for fewer than three points.
pub fn polygon_area_px2(points: &[Point2D]) -> Option<f64> {
    if points.len() < 3 {
        return None;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = &points[i];
        let b = &points[(i + 1) % points.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    Some(sum.abs() / 2.0)
}

/// Shoelace area on spacing-scaled coordinates, in mm².
pub fn polygon_area_mm2(points: &[Point2D], spacing: Option<&PixelSpacing>) -> Option<f64> {
    let spacing = spacing?;
    if points.len() < 3 {
        return None;
    }
    let scaled: Vec<Point2D> = points.iter().map(|p| spacing.scale(p)).collect();
    polygon_area_px2(&scaled)
}

/// Total length of a point path in pixels; adds the closing segment when
/// `closed` is set and the path has at least three points.
pub fn path_length_px(points: &[Point2D], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for pair in points.windows(2) {
        total += pair[0].distance_to(&pair[1]);
    }
    if closed && points.len() >= 3 {
        total += points[points.len() - 1].distance_to(&points[0]);
    }
    total
}

/// Consecutive segment lengths in mm, `None` without spacing.
pub fn segment_lengths_mm(points: &[Point2D], spacing: Option<&PixelSpacing>) -> Option<Vec<f64>> {
    spacing?;
    let mut lengths = Vec::with_capacity(points.len().saturating_sub(1));
    for pair in points.windows(2) {
        lengths.push(distance_mm(&pair[0], &pair[1], spacing)?);
    }
    Some(lengths)
}

/// Perimeter (or open path length) in mm.
pub fn perimeter_mm(
    points: &[Point2D],
    spacing: Option<&PixelSpacing>,
    closed: bool,
) -> Option<f64> {
    let spacing = spacing?;
    if points.len() < 2 {
        return Some(0.0);
    }
    let scaled: Vec<Point2D> = points.iter().map(|p| spacing.scale(p)).collect();
    Some(path_length_px(&scaled, closed))
}

/// Area of an ellipse with pixel radii under anisotropic spacing. The linear
/// map to mm space scales any ellipse area by row·column spacing, so the
/// rotation angle drops out.
pub fn ellipse_area_mm2(
    radius_x: f64,
    radius_y: f64,
    spacing: Option<&PixelSpacing>,
) -> Option<f64> {
    let spacing = spacing?;
    Some(PI * radius_x * radius_y * spacing.row_spacing_mm * spacing.column_spacing_mm)
}

pub fn rectangle_area_mm2(
    top_left: &Point2D,
    bottom_right: &Point2D,
    spacing: Option<&PixelSpacing>,
) -> Option<f64> {
    let spacing = spacing?;
    let width = (bottom_right.x - top_left.x).abs() * spacing.column_spacing_mm;
    let height = (bottom_right.y - top_left.y).abs() * spacing.row_spacing_mm;
    Some(width * height)
}

fn sorted_slice_areas(
    contours_by_slice: &BTreeMap<u32, Vec<Point2D>>,
    spacing: Option<&PixelSpacing>,
) -> Option<Vec<f64>> {
    // BTreeMap iteration is already ordered by slice index
    contours_by_slice
        .values()
        .map(|points| polygon_area_mm2(points, spacing))
        .collect()
}

/// Trapezoidal stacked-contour volume in mm³. Needs at least two slices,
/// pixel spacing, and a positive slice thickness.
pub fn volume_from_contours(
    contours_by_slice: &BTreeMap<u32, Vec<Point2D>>,
    spacing: Option<&PixelSpacing>,
    slice_thickness_mm: f64,
) -> Option<f64> {
    if slice_thickness_mm <= 0.0 {
        return None;
    }
    let areas = sorted_slice_areas(contours_by_slice, spacing)?;
    if areas.len() < 2 {
        return None;
    }
    let mut volume = 0.0;
    for pair in areas.windows(2) {
        volume += (pair[0] + pair[1]) / 2.0 * slice_thickness_mm;
    }
    Some(volume)
}

/// Simpson's-rule variant: h/3·(A0 + 4·A1 + 2·A2 + … + An) with 4/2 weights
/// alternating on odd/even interior slices. Falls back to the trapezoidal
/// rule below three slices.
pub fn volume_from_contours_simpson(
    contours_by_slice: &BTreeMap<u32, Vec<Point2D>>,
    spacing: Option<&PixelSpacing>,
    slice_thickness_mm: f64,
) -> Option<f64> {
    if slice_thickness_mm <= 0.0 {
        return None;
    }
    let areas = sorted_slice_areas(contours_by_slice, spacing)?;
    if areas.len() < 3 {
        return volume_from_contours(contours_by_slice, spacing, slice_thickness_mm);
    }
    let last = areas.len() - 1;
    let mut weighted = 0.0;
    for (i, area) in areas.iter().enumerate() {
        let weight = if i == 0 || i == last {
            1.0
        } else if i % 2 == 1 {
            4.0
        } else {
            2.0
        };
        weighted += weight * area;
    }
    Some(slice_thickness_mm / 3.0 * weighted)
}

#[cfg(test)]
mod area_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(size, 0.0),
            Point2D::new(size, size),
            Point2D::new(0.0, size),
        ]
    }

    #[test]
    fn test_unit_square_area() {
        let spacing = PixelSpacing::isotropic(1.0);
        let area = polygon_area_mm2(&square(1.0), Some(&spacing)).unwrap();
        assert_relative_eq!(area, 1.0);
    }

    #[test]
    fn test_area_orientation_independent() {
        let spacing = PixelSpacing::isotropic(1.0);
        let mut reversed = square(2.0);
        reversed.reverse();
        let forward = polygon_area_mm2(&square(2.0), Some(&spacing)).unwrap();
        let backward = polygon_area_mm2(&reversed, Some(&spacing)).unwrap();
        assert_relative_eq!(forward, backward);
        assert_relative_eq!(forward, 4.0);
    }

    #[test]
    fn test_area_requires_spacing_and_three_points() {
        assert_eq!(polygon_area_mm2(&square(1.0), None), None);
        let spacing = PixelSpacing::isotropic(1.0);
        assert_eq!(polygon_area_mm2(&square(1.0)[..2], Some(&spacing)), None);
    }

    #[test]
    fn test_rectangle_polygon_area_and_perimeter() {
        // the 4x3 rectangle from the acceptance scenarios
        let points = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(4.0, 3.0),
            Point2D::new(0.0, 3.0),
        ];
        let spacing = PixelSpacing::isotropic(1.0);
        assert_relative_eq!(polygon_area_mm2(&points, Some(&spacing)).unwrap(), 12.0);
        assert_relative_eq!(perimeter_mm(&points, Some(&spacing), true).unwrap(), 14.0);
        // open path omits the closing edge
        assert_relative_eq!(perimeter_mm(&points, Some(&spacing), false).unwrap(), 11.0);
    }

    #[test]
    fn test_segment_lengths() {
        let points = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(3.0, 4.0),
            Point2D::new(3.0, 10.0),
        ];
        let spacing = PixelSpacing::isotropic(1.0);
        let lengths = segment_lengths_mm(&points, Some(&spacing)).unwrap();
        assert_eq!(lengths.len(), 2);
        assert_relative_eq!(lengths[0], 5.0);
        assert_relative_eq!(lengths[1], 6.0);
    }

    #[test]
    fn test_ellipse_and_rectangle_area() {
        let spacing = PixelSpacing::new(0.5, 2.0);
        let area = ellipse_area_mm2(2.0, 1.0, Some(&spacing)).unwrap();
        assert_relative_eq!(area, std::f64::consts::PI * 2.0);
        let rect = rectangle_area_mm2(
            &Point2D::new(0.0, 0.0),
            &Point2D::new(4.0, 2.0),
            Some(&spacing),
        )
        .unwrap();
        assert_relative_eq!(rect, 4.0 * 2.0 * 0.5 * 2.0);
    }

    #[test]
    fn test_trapezoidal_volume() {
        let spacing = PixelSpacing::isotropic(1.0);
        let mut slices = BTreeMap::new();
        slices.insert(0, square(1.0)); // 1 mm²
        slices.insert(1, square(2.0)); // 4 mm²
        let volume = volume_from_contours(&slices, Some(&spacing), 2.0).unwrap();
        assert_relative_eq!(volume, (1.0 + 4.0) / 2.0 * 2.0);
    }

    #[test]
    fn test_simpson_falls_back_below_three_slices() {
        let spacing = PixelSpacing::isotropic(1.0);
        let mut slices = BTreeMap::new();
        slices.insert(0, square(1.0));
        slices.insert(1, square(2.0));
        let trapezoid = volume_from_contours(&slices, Some(&spacing), 1.0).unwrap();
        let simpson = volume_from_contours_simpson(&slices, Some(&spacing), 1.0).unwrap();
        assert_relative_eq!(trapezoid, simpson);
    }

    #[test]
    fn test_simpson_weighting() {
        let spacing = PixelSpacing::isotropic(1.0);
        let mut slices = BTreeMap::new();
        slices.insert(0, square(1.0)); // 1 mm²
        slices.insert(1, square(2.0)); // 4 mm²
        slices.insert(2, square(3.0)); // 9 mm²
        let volume = volume_from_contours_simpson(&slices, Some(&spacing), 1.0).unwrap();
        assert_relative_eq!(volume, (1.0 + 4.0 * 4.0 + 9.0) / 3.0);
    }

    #[test]
    fn test_volume_needs_two_slices() {
        let spacing = PixelSpacing::isotropic(1.0);
        let mut slices = BTreeMap::new();
        slices.insert(0, square(1.0));
        assert_eq!(volume_from_contours(&slices, Some(&spacing), 1.0), None);
        assert_eq!(volume_from_contours(&slices, None, 1.0), None);
    }
}
