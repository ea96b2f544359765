use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{
    self, ellipse_area_mm2, perimeter_mm, polygon_area_mm2, rectangle_area_mm2,
    segment_lengths_mm, PixelSpacing, Point2D,
};

/// Stable, never-reused key for a measurement within one store.
/// Kept as an integer newtype so ids cannot be confused with series or
/// frame identifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MeasurementId(pub u64);

/// Visibility/persistence domain of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementScope {
    /// Visible only on its own frame key.
    Frame,
    /// Visible on every frame of the series, eligible for cine tracking.
    Series,
    /// Spans slices of a volume.
    Volume,
}

/// Volume derived from stacking this polygon's contour across slices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeData {
    pub volume_mm3: f64,
    pub slice_thickness_mm: f64,
    pub slice_count: usize,
}

/// The geometric payload of a measurement, discriminated by `type`.
/// Derived mm fields are `None` whenever the series has no pixel spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Line {
        points: [Point2D; 2],
        length_mm: Option<f64>,
    },
    Polyline {
        points: Vec<Point2D>,
        total_length_mm: Option<f64>,
        segment_lengths_mm: Option<Vec<f64>>,
    },
    Polygon {
        points: Vec<Point2D>,
        area_mm2: Option<f64>,
        perimeter_mm: Option<f64>,
        volume: Option<VolumeData>,
    },
    Freehand {
        points: Vec<Point2D>,
        closed: bool,
        area_mm2: Option<f64>,
        length_mm: Option<f64>,
    },
    Ellipse {
        center: Point2D,
        radius_x: f64,
        radius_y: f64,
        rotation_deg: f64,
        area_mm2: Option<f64>,
    },
    Rectangle {
        top_left: Point2D,
        bottom_right: Point2D,
        area_mm2: Option<f64>,
    },
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Line { .. } => "line",
            Shape::Polyline { .. } => "polyline",
            Shape::Polygon { .. } => "polygon",
            Shape::Freehand { .. } => "freehand",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Rectangle { .. } => "rectangle",
        }
    }

    /// Only lines and polygons carry per-frame tracking samples.
    pub fn supports_tracking(&self) -> bool {
        matches!(self, Shape::Line { .. } | Shape::Polygon { .. })
    }

    /// Whether the outline runs back to its first point.
    pub fn is_closed(&self) -> bool {
        match self {
            Shape::Line { .. } | Shape::Polyline { .. } => false,
            Shape::Polygon { .. } | Shape::Ellipse { .. } | Shape::Rectangle { .. } => true,
            Shape::Freehand { closed, .. } => *closed,
        }
    }

    /// Draggable control points. For an ellipse these are the center and the
    /// four axis endpoints; for a rectangle the four corners.
    pub fn control_points(&self) -> Vec<Point2D> {
        match self {
            Shape::Line { points, .. } => points.to_vec(),
            Shape::Polyline { points, .. }
            | Shape::Polygon { points, .. }
            | Shape::Freehand { points, .. } => points.clone(),
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                rotation_deg,
                ..
            } => {
                let rad = rotation_deg.to_radians();
                let (sin, cos) = rad.sin_cos();
                vec![
                    *center,
                    Point2D::new(center.x + radius_x * cos, center.y + radius_x * sin),
                    Point2D::new(center.x - radius_x * cos, center.y - radius_x * sin),
                    Point2D::new(center.x - radius_y * sin, center.y + radius_y * cos),
                    Point2D::new(center.x + radius_y * sin, center.y - radius_y * cos),
                ]
            }
            Shape::Rectangle {
                top_left,
                bottom_right,
                ..
            } => vec![
                *top_left,
                Point2D::new(bottom_right.x, top_left.y),
                *bottom_right,
                Point2D::new(top_left.x, bottom_right.y),
            ],
        }
    }

    /// Outline vertices used for edge hit-testing and containment. The
    /// ellipse outline is sampled.
    pub fn outline(&self) -> Vec<Point2D> {
        match self {
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                rotation_deg,
                ..
            } => {
                const SAMPLES: usize = 32;
                let rad = rotation_deg.to_radians();
                let (sin, cos) = rad.sin_cos();
                (0..SAMPLES)
                    .map(|i| {
                        let theta = 2.0 * std::f64::consts::PI * i as f64 / SAMPLES as f64;
                        let lx = radius_x * theta.cos();
                        let ly = radius_y * theta.sin();
                        Point2D::new(
                            center.x + lx * cos - ly * sin,
                            center.y + lx * sin + ly * cos,
                        )
                    })
                    .collect()
            }
            Shape::Rectangle { .. } => self.control_points(),
            Shape::Line { points, .. } => points.to_vec(),
            Shape::Polyline { points, .. }
            | Shape::Polygon { points, .. }
            | Shape::Freehand { points, .. } => points.clone(),
        }
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        match self {
            Shape::Line { .. } | Shape::Polyline { .. } => false,
            Shape::Polygon { points, .. } => geometry::point_in_polygon(p, points),
            Shape::Freehand { points, closed, .. } => {
                *closed && geometry::point_in_polygon(p, points)
            }
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                rotation_deg,
                ..
            } => geometry::point_in_ellipse(p, center, *radius_x, *radius_y, rotation_deg.to_radians()),
            Shape::Rectangle {
                top_left,
                bottom_right,
                ..
            } => {
                p.x >= top_left.x.min(bottom_right.x)
                    && p.x <= top_left.x.max(bottom_right.x)
                    && p.y >= top_left.y.min(bottom_right.y)
                    && p.y <= top_left.y.max(bottom_right.y)
            }
        }
    }

    /// Geometric center, used to rank overlapping body hits.
    pub fn centroid(&self) -> Point2D {
        let points = self.control_points();
        if points.is_empty() {
            return Point2D::new(0.0, 0.0);
        }
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2D::new(sx / points.len() as f64, sy / points.len() as f64)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Shape::Line { points, .. } => {
                for p in points.iter_mut() {
                    *p = p.translated(dx, dy);
                }
            }
            Shape::Polyline { points, .. }
            | Shape::Polygon { points, .. }
            | Shape::Freehand { points, .. } => {
                for p in points.iter_mut() {
                    *p = p.translated(dx, dy);
                }
            }
            Shape::Ellipse { center, .. } => *center = center.translated(dx, dy),
            Shape::Rectangle {
                top_left,
                bottom_right,
                ..
            } => {
                *top_left = top_left.translated(dx, dy);
                *bottom_right = bottom_right.translated(dx, dy);
            }
        }
    }

    /// Moves one control point. Returns false when the index does not exist.
    /// Ellipse index 0 drags the center; the axis endpoints resize their
    /// radius. Rectangle corners drag their two adjacent sides.
    pub fn move_point(&mut self, index: usize, target: Point2D) -> bool {
        match self {
            Shape::Line { points, .. } => match points.get_mut(index) {
                Some(p) => {
                    *p = target;
                    true
                }
                None => false,
            },
            Shape::Polyline { points, .. }
            | Shape::Polygon { points, .. }
            | Shape::Freehand { points, .. } => match points.get_mut(index) {
                Some(p) => {
                    *p = target;
                    true
                }
                None => false,
            },
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                ..
            } => match index {
                0 => {
                    *center = target;
                    true
                }
                1 | 2 => {
                    *radius_x = center.distance_to(&target).max(f64::EPSILON);
                    true
                }
                3 | 4 => {
                    *radius_y = center.distance_to(&target).max(f64::EPSILON);
                    true
                }
                _ => false,
            },
            Shape::Rectangle {
                top_left,
                bottom_right,
                ..
            } => match index {
                0 => {
                    *top_left = target;
                    true
                }
                1 => {
                    bottom_right.x = target.x;
                    top_left.y = target.y;
                    true
                }
                2 => {
                    *bottom_right = target;
                    true
                }
                3 => {
                    top_left.x = target.x;
                    bottom_right.y = target.y;
                    true
                }
                _ => false,
            },
        }
    }

    /// Recomputes every derived physical-unit field from the current
    /// geometry. Without spacing all mm fields become `None`. The stacked
    /// volume of a polygon is owned by the caller and left untouched.
    pub fn recompute(&mut self, spacing: Option<&PixelSpacing>) {
        match self {
            Shape::Line { points, length_mm } => {
                *length_mm = geometry::distance_mm(&points[0], &points[1], spacing);
            }
            Shape::Polyline {
                points,
                total_length_mm,
                segment_lengths_mm: lengths,
            } => {
                *total_length_mm = perimeter_mm(points, spacing, false);
                *lengths = segment_lengths_mm(points, spacing);
            }
            Shape::Polygon {
                points,
                area_mm2,
                perimeter_mm: perimeter,
                ..
            } => {
                *area_mm2 = polygon_area_mm2(points, spacing);
                *perimeter = perimeter_mm(points, spacing, true);
            }
            Shape::Freehand {
                points,
                closed,
                area_mm2,
                length_mm,
            } => {
                *area_mm2 = if *closed {
                    polygon_area_mm2(points, spacing)
                } else {
                    None
                };
                *length_mm = perimeter_mm(points, spacing, *closed);
            }
            Shape::Ellipse {
                radius_x,
                radius_y,
                area_mm2,
                ..
            } => {
                *area_mm2 = ellipse_area_mm2(*radius_x, *radius_y, spacing);
            }
            Shape::Rectangle {
                top_left,
                bottom_right,
                area_mm2,
            } => {
                *area_mm2 = rectangle_area_mm2(top_left, bottom_right, spacing);
            }
        }
    }

    /// Scalar reported by cine tracking for this shape: length for lines,
    /// area for polygons.
    pub fn tracking_value_mm(&self) -> Option<f64> {
        match self {
            Shape::Line { length_mm, .. } => *length_mm,
            Shape::Polygon { area_mm2, .. } => *area_mm2,
            _ => None,
        }
    }
}

/// A user-authored annotation over one series.
///
/// Invariants, enforced at every store mutation site:
/// `frame_key.is_some()` exactly when `scope == Frame`, and
/// `modified_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub shape: Shape,
    pub scope: MeasurementScope,
    pub label: String,
    pub color: String,
    pub visible: bool,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub series_uid: String,
    pub frame_key: Option<u32>,
}

impl Measurement {
    pub fn scope_is_consistent(&self) -> bool {
        self.frame_key.is_some() == (self.scope == MeasurementScope::Frame)
    }

    /// Bumps `modified_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.modified_at = if now < self.created_at {
            self.created_at
        } else {
            now
        };
    }

    /// Whether this measurement shows on the given frame of the given
    /// series. Frame-scoped entities appear only on their own frame key;
    /// series- and volume-scoped entities appear on every frame.
    pub fn applies_to_frame(&self, series_uid: &str, frame_key: u32) -> bool {
        if self.series_uid != series_uid {
            return false;
        }
        match self.scope {
            MeasurementScope::Frame => self.frame_key == Some(frame_key),
            MeasurementScope::Series | MeasurementScope::Volume => true,
        }
    }
}
