//! Shared fixture builders for the test suites.

use chrono::Utc;

use crate::geometry::{PixelSpacing, Point2D};
use crate::measurement::{Measurement, MeasurementId, MeasurementScope, Shape};
use crate::store::NewMeasurement;
use crate::tracking::TrackedFrame;

pub fn unit_spacing() -> PixelSpacing {
    PixelSpacing::isotropic(1.0)
}

pub fn points(coords: &[(f64, f64)]) -> Vec<Point2D> {
    coords.iter().map(|(x, y)| Point2D::new(*x, *y)).collect()
}

/// Series-scoped measurement with fresh timestamps, for kernel-level tests
/// that bypass the store.
pub fn new_measurement(id: u64, shape: Shape) -> Measurement {
    let now = Utc::now();
    Measurement {
        id: MeasurementId(id),
        shape,
        scope: MeasurementScope::Series,
        label: format!("m{}", id),
        color: "#ffcc00".to_string(),
        visible: true,
        locked: false,
        created_at: now,
        modified_at: now,
        series_uid: "series-1".to_string(),
        frame_key: None,
    }
}

pub fn new_line(from: (f64, f64), to: (f64, f64)) -> NewMeasurement {
    NewMeasurement {
        shape: Shape::Line {
            points: [Point2D::new(from.0, from.1), Point2D::new(to.0, to.1)],
            length_mm: None,
        },
        scope: MeasurementScope::Series,
        label: "line".to_string(),
        color: "#ffcc00".to_string(),
        series_uid: "series-1".to_string(),
        frame_key: None,
    }
}

pub fn new_polygon(coords: &[(f64, f64)]) -> NewMeasurement {
    NewMeasurement {
        shape: Shape::Polygon {
            points: points(coords),
            area_mm2: None,
            perimeter_mm: None,
            volume: None,
        },
        scope: MeasurementScope::Series,
        label: "polygon".to_string(),
        color: "#ffcc00".to_string(),
        series_uid: "series-1".to_string(),
        frame_key: None,
    }
}

pub fn tracked_frame(frame_index: u32, coords: &[(f64, f64)], value_mm: Option<f64>) -> TrackedFrame {
    TrackedFrame {
        frame_index,
        points: points(coords),
        value_mm,
        valid: true,
    }
}
