use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;

/// One sampled frame from the motion-tracking collaborator. `value_mm` is
/// the tracked scalar: length for lines, area for polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrame {
    pub frame_index: u32,
    pub points: Vec<Point2D>,
    pub value_mm: Option<f64>,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Sparse per-frame tracking samples for one measurement. Frame indices
/// are unique within one `TrackingData`; the samples need not cover every
/// frame of the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingData {
    pub series_uid: String,
    pub total_frames: u32,
    pub frames: Vec<TrackedFrame>,
    pub summary: Option<TrackingSummary>,
}

impl TrackingData {
    /// Recomputes min/max/mean over the valid scalar samples.
    pub fn summarize(&mut self) {
        let values: Vec<f64> = self
            .frames
            .iter()
            .filter(|f| f.valid)
            .filter_map(|f| f.value_mm)
            .collect();
        self.summary = if values.is_empty() {
            None
        } else {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some(TrackingSummary { min, max, mean })
        };
    }
}

/// Request shape sent to the external tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRequest {
    pub start_frame_index: u32,
    pub points: Vec<Point2D>,
    pub track_full_loop: bool,
}

/// Response shape from the external tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub frames: Vec<TrackedFrame>,
    pub summary: Option<TrackingSummary>,
}

impl TrackingResponse {
    /// Static fallback a caller may substitute when the collaborator fails:
    /// the initial geometry repeated across all frames.
    pub fn static_fallback(points: &[Point2D], value_mm: Option<f64>, total_frames: u32) -> Self {
        let frames = (0..total_frames)
            .map(|frame_index| TrackedFrame {
                frame_index,
                points: points.to_vec(),
                value_mm,
                valid: true,
            })
            .collect();
        let mut data = TrackingData {
            series_uid: String::new(),
            total_frames,
            frames,
            summary: None,
        };
        data.summarize();
        TrackingResponse {
            frames: data.frames,
            summary: data.summary,
        }
    }
}

/// The tracking collaborator as seen by the core: an opaque, possibly slow,
/// possibly failing call. The shell owns scheduling and retries.
pub trait TrackingProvider {
    fn track(&self, request: &TrackingRequest) -> anyhow::Result<TrackingResponse>;
}

/// Frames marking the scalar extrema of one tracked entity, used as
/// end-diastole / end-systole style landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseExtrema {
    pub max_frame: u32,
    pub min_frame: u32,
}

/// Answers "value at frame N" queries for cine playback from a sparse,
/// possibly unsorted sample set.
#[derive(Debug, Clone)]
pub struct TrackingInterpolator {
    frames: Vec<TrackedFrame>,
}

impl TrackingInterpolator {
    pub fn new(samples: &[TrackedFrame]) -> Self {
        let mut frames = samples.to_vec();
        frames.sort_by_key(|f| f.frame_index);
        frames.dedup_by_key(|f| f.frame_index);
        TrackingInterpolator { frames }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[TrackedFrame] {
        &self.frames
    }

    /// Nearest sampled frames at or below / at or above `frame_index`.
    fn bracket(&self, frame_index: u32) -> (Option<&TrackedFrame>, Option<&TrackedFrame>) {
        let lower = self
            .frames
            .iter()
            .rev()
            .find(|f| f.valid && f.frame_index <= frame_index);
        let upper = self
            .frames
            .iter()
            .find(|f| f.valid && f.frame_index >= frame_index);
        (lower, upper)
    }

    /// Scalar value at an arbitrary frame: the exact sample when present,
    /// linear interpolation between the bracketing samples otherwise, and
    /// the single available neighbor at the sequence boundaries.
    pub fn value_at(&self, frame_index: u32) -> Option<f64> {
        match self.bracket(frame_index) {
            (Some(lower), Some(upper)) => {
                if lower.frame_index == upper.frame_index {
                    return lower.value_mm;
                }
                let a = lower.value_mm?;
                let b = upper.value_mm?;
                let t = (frame_index - lower.frame_index) as f64
                    / (upper.frame_index - lower.frame_index) as f64;
                Some(a * (1.0 - t) + b * t)
            }
            (Some(single), None) | (None, Some(single)) => single.value_mm,
            (None, None) => None,
        }
    }

    /// Interpolated geometry at an arbitrary frame. Points are interpolated
    /// pairwise only when the bracketing samples agree in point count;
    /// otherwise the nearer sample's points are returned as-is.
    pub fn points_at(&self, frame_index: u32) -> Option<Vec<Point2D>> {
        match self.bracket(frame_index) {
            (Some(lower), Some(upper)) => {
                if lower.frame_index == upper.frame_index {
                    return Some(lower.points.clone());
                }
                let span = (upper.frame_index - lower.frame_index) as f64;
                let t = (frame_index - lower.frame_index) as f64 / span;
                if lower.points.len() != upper.points.len() {
                    // mismatched topologies are never blended
                    let nearest = if t < 0.5 { lower } else { upper };
                    return Some(nearest.points.clone());
                }
                Some(
                    lower
                        .points
                        .iter()
                        .zip(&upper.points)
                        .map(|(a, b)| {
                            Point2D::new(a.x * (1.0 - t) + b.x * t, a.y * (1.0 - t) + b.y * t)
                        })
                        .collect(),
                )
            }
            (Some(single), None) | (None, Some(single)) => Some(single.points.clone()),
            (None, None) => None,
        }
    }

    /// Temporal smoothing: each frame's points become the mean of the
    /// points within a symmetric window of ±`window` samples. Applied only
    /// when every sampled frame has the same point count; otherwise the
    /// samples are returned unchanged.
    pub fn smoothed(&self, window: usize) -> Vec<TrackedFrame> {
        let Some(first) = self.frames.first() else {
            return Vec::new();
        };
        let point_count = first.points.len();
        if window == 0
            || point_count == 0
            || self.frames.iter().any(|f| f.points.len() != point_count)
        {
            return self.frames.clone();
        }
        let n = self.frames.len();
        self.frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                let lo = i.saturating_sub(window);
                let hi = (i + window).min(n - 1);
                let count = (hi - lo + 1) as f64;
                let points = (0..point_count)
                    .map(|p| {
                        let (sx, sy) = self.frames[lo..=hi]
                            .iter()
                            .fold((0.0, 0.0), |(sx, sy), f| {
                                (sx + f.points[p].x, sy + f.points[p].y)
                            });
                        Point2D::new(sx / count, sy / count)
                    })
                    .collect();
                TrackedFrame {
                    frame_index: frame.frame_index,
                    points,
                    value_mm: frame.value_mm,
                    valid: frame.valid,
                }
            })
            .collect()
    }

    /// Frames holding the maximum and minimum valid scalar value.
    pub fn extrema(&self) -> Option<PhaseExtrema> {
        let mut best_max: Option<(u32, f64)> = None;
        let mut best_min: Option<(u32, f64)> = None;
        for frame in self.frames.iter().filter(|f| f.valid) {
            let Some(value) = frame.value_mm else { continue };
            if best_max.map_or(true, |(_, v)| value > v) {
                best_max = Some((frame.frame_index, value));
            }
            if best_min.map_or(true, |(_, v)| value < v) {
                best_min = Some((frame.frame_index, value));
            }
        }
        Some(PhaseExtrema {
            max_frame: best_max?.0,
            min_frame: best_min?.0,
        })
    }

    pub fn summary(&self) -> Option<TrackingSummary> {
        let mut data = TrackingData {
            series_uid: String::new(),
            total_frames: 0,
            frames: self.frames.clone(),
            summary: None,
        };
        data.summarize();
        data.summary
    }
}

#[cfg(test)]
mod tracking_tests {
    use super::*;
    use crate::utils::test_utils::tracked_frame;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_at_interpolates_linearly() {
        // samples at frames 0 (value 10) and 10 (value 20)
        let samples = vec![
            tracked_frame(10, &[(3.0, 0.0)], Some(20.0)),
            tracked_frame(0, &[(1.0, 0.0)], Some(10.0)),
        ];
        let interp = TrackingInterpolator::new(&samples);
        assert_relative_eq!(interp.value_at(5).unwrap(), 15.0);
        assert_relative_eq!(interp.value_at(0).unwrap(), 10.0);
        assert_relative_eq!(interp.value_at(10).unwrap(), 20.0);
    }

    #[test]
    fn test_value_at_boundary_falls_back_to_neighbor() {
        let samples = vec![
            tracked_frame(5, &[(0.0, 0.0)], Some(7.0)),
            tracked_frame(8, &[(0.0, 0.0)], Some(9.0)),
        ];
        let interp = TrackingInterpolator::new(&samples);
        assert_relative_eq!(interp.value_at(2).unwrap(), 7.0);
        assert_relative_eq!(interp.value_at(12).unwrap(), 9.0);
    }

    #[test]
    fn test_points_at_blends_matching_topologies() {
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0), (10.0, 0.0)], Some(1.0)),
            tracked_frame(4, &[(4.0, 4.0), (14.0, 4.0)], Some(2.0)),
        ];
        let interp = TrackingInterpolator::new(&samples);
        let points = interp.points_at(2).unwrap();
        assert_relative_eq!(points[0].x, 2.0);
        assert_relative_eq!(points[0].y, 2.0);
        assert_relative_eq!(points[1].x, 12.0);
    }

    #[test]
    fn test_points_at_never_blends_mismatched_topologies() {
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0), (10.0, 0.0)], Some(1.0)),
            tracked_frame(4, &[(4.0, 4.0)], Some(2.0)),
        ];
        let interp = TrackingInterpolator::new(&samples);
        assert_eq!(interp.points_at(1).unwrap().len(), 2);
        assert_eq!(interp.points_at(3).unwrap().len(), 1);
    }

    #[test]
    fn test_smoothing_window_mean() {
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0)], None),
            tracked_frame(1, &[(3.0, 0.0)], None),
            tracked_frame(2, &[(6.0, 0.0)], None),
        ];
        let smoothed = TrackingInterpolator::new(&samples).smoothed(1);
        // middle frame averages all three samples
        assert_relative_eq!(smoothed[1].points[0].x, 3.0);
        // edge frames average the two frames in reach
        assert_relative_eq!(smoothed[0].points[0].x, 1.5);
        assert_relative_eq!(smoothed[2].points[0].x, 4.5);
    }

    #[test]
    fn test_smoothing_skipped_on_mismatched_point_counts() {
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0)], None),
            tracked_frame(1, &[(3.0, 0.0), (5.0, 0.0)], None),
        ];
        let interp = TrackingInterpolator::new(&samples);
        assert_eq!(interp.smoothed(1), interp.frames().to_vec());
    }

    #[test]
    fn test_extrema_ignores_invalid_frames() {
        let mut spike = tracked_frame(3, &[(0.0, 0.0)], Some(100.0));
        spike.valid = false;
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0)], Some(12.0)),
            tracked_frame(1, &[(0.0, 0.0)], Some(8.0)),
            tracked_frame(2, &[(0.0, 0.0)], Some(15.0)),
            spike,
        ];
        let extrema = TrackingInterpolator::new(&samples).extrema().unwrap();
        assert_eq!(extrema.max_frame, 2);
        assert_eq!(extrema.min_frame, 1);
    }

    #[test]
    fn test_summarize() {
        let samples = vec![
            tracked_frame(0, &[(0.0, 0.0)], Some(10.0)),
            tracked_frame(1, &[(0.0, 0.0)], Some(20.0)),
        ];
        let summary = TrackingInterpolator::new(&samples).summary().unwrap();
        assert_relative_eq!(summary.min, 10.0);
        assert_relative_eq!(summary.max, 20.0);
        assert_relative_eq!(summary.mean, 15.0);
    }

    #[test]
    fn test_static_fallback_repeats_shape() {
        let points = vec![Point2D::new(1.0, 2.0)];
        let response = TrackingResponse::static_fallback(&points, Some(5.0), 4);
        assert_eq!(response.frames.len(), 4);
        assert!(response.frames.iter().all(|f| f.points == points));
        assert_relative_eq!(response.summary.unwrap().mean, 5.0);
    }
}
