use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::history::History;
use crate::config::Settings;
use crate::geometry::{chaikin_smooth, polygon_area_mm2, polygon_area_px2, simplify_polyline,
    PixelSpacing, Point2D};

/// Minimum vertex count for a contour to remain a region.
const MIN_CONTOUR_POINTS: usize = 3;

/// Output shape of the external AI segmentation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub instance_uid: String,
    pub frames: Vec<SegmentedFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedFrame {
    pub frame_index: u32,
    pub contours: Vec<Vec<Point2D>>,
}

/// Key derived from the segmentation instance: frame first, then the
/// contour's position within that frame.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContourKey {
    pub frame_index: u32,
    pub index: u32,
}

/// An AI-derived contour opened up for review edits. `original_points` is
/// the immutable baseline `reset` returns to; deletion is a soft flag so
/// a reviewer can bring a contour back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableContour {
    pub key: ContourKey,
    pub points: Vec<Point2D>,
    pub original_points: Vec<Point2D>,
    pub is_modified: bool,
    pub is_deleted: bool,
    pub visible: bool,
    pub area_px2: f64,
    pub area_mm2: Option<f64>,
}

/// One reversible contour edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentationEditAction {
    ModifyContour {
        key: ContourKey,
        before: Vec<Point2D>,
        after: Vec<Point2D>,
    },
    AddPoint {
        key: ContourKey,
        index: usize,
        point: Point2D,
    },
    RemovePoint {
        key: ContourKey,
        index: usize,
        point: Point2D,
    },
    Delete {
        key: ContourKey,
    },
    Restore {
        key: ContourKey,
    },
}

/// Parallel store for segmentation-derived contours. It mirrors the
/// measurement store's history discipline but deletes softly: contours
/// are re-derivable review artifacts, not user-authored content.
#[derive(Debug, Clone)]
pub struct SegmentationContourStore {
    settings: Settings,
    spacing: Option<PixelSpacing>,
    contours: BTreeMap<ContourKey, EditableContour>,
    history: History<SegmentationEditAction>,
}

impl Default for SegmentationContourStore {
    fn default() -> Self {
        SegmentationContourStore::new(Settings::default())
    }
}

impl SegmentationContourStore {
    pub fn new(settings: Settings) -> Self {
        let capacity = settings.max_undo_history;
        SegmentationContourStore {
            settings,
            spacing: None,
            contours: BTreeMap::new(),
            history: History::new(capacity),
        }
    }

    /// Replaces the store content with a fresh segmentation result and
    /// clears the edit history.
    pub fn load_result(&mut self, result: &SegmentationResult, spacing: Option<PixelSpacing>) {
        self.spacing = spacing;
        self.contours.clear();
        self.history.clear();
        for frame in &result.frames {
            for (index, points) in frame.contours.iter().enumerate() {
                let key = ContourKey {
                    frame_index: frame.frame_index,
                    index: index as u32,
                };
                let mut contour = EditableContour {
                    key,
                    points: points.clone(),
                    original_points: points.clone(),
                    is_modified: false,
                    is_deleted: false,
                    visible: true,
                    area_px2: 0.0,
                    area_mm2: None,
                };
                Self::recompute_area(&mut contour, spacing.as_ref());
                self.contours.insert(key, contour);
            }
        }
        info!(
            "loaded segmentation {} with {} contours",
            result.instance_uid,
            self.contours.len()
        );
    }

    fn recompute_area(contour: &mut EditableContour, spacing: Option<&PixelSpacing>) {
        contour.area_px2 = polygon_area_px2(&contour.points).unwrap_or(0.0);
        contour.area_mm2 = polygon_area_mm2(&contour.points, spacing);
        contour.is_modified = contour.points != contour.original_points;
    }

    pub fn contour(&self, key: ContourKey) -> Option<&EditableContour> {
        self.contours.get(&key)
    }

    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Contours to paint on one frame: not soft-deleted and not hidden.
    pub fn visible_contours(&self, frame_index: u32) -> Vec<&EditableContour> {
        self.contours
            .values()
            .filter(|c| c.key.frame_index == frame_index && c.visible && !c.is_deleted)
            .collect()
    }

    /// Replaces a contour's points wholesale and records one edit. The
    /// shared path for move/simplify/smooth/reset.
    fn commit_points(&mut self, key: ContourKey, after: Vec<Point2D>) -> bool {
        let spacing = self.spacing;
        let Some(contour) = self.contours.get_mut(&key) else {
            return false;
        };
        if contour.is_deleted || contour.points == after {
            return false;
        }
        let before = std::mem::replace(&mut contour.points, after.clone());
        Self::recompute_area(contour, spacing.as_ref());
        self.history.record(SegmentationEditAction::ModifyContour {
            key,
            before,
            after,
        });
        true
    }

    pub fn move_point(&mut self, key: ContourKey, index: usize, target: Point2D) -> bool {
        let Some(contour) = self.contours.get(&key) else {
            return false;
        };
        if contour.is_deleted || index >= contour.points.len() {
            return false;
        }
        let mut after = contour.points.clone();
        after[index] = target;
        self.commit_points(key, after)
    }

    /// Inserts a vertex before `index` (or at the end when `index` equals
    /// the point count).
    pub fn add_point(&mut self, key: ContourKey, index: usize, point: Point2D) -> bool {
        let spacing = self.spacing;
        let Some(contour) = self.contours.get_mut(&key) else {
            return false;
        };
        if contour.is_deleted || index > contour.points.len() {
            return false;
        }
        contour.points.insert(index, point);
        Self::recompute_area(contour, spacing.as_ref());
        self.history
            .record(SegmentationEditAction::AddPoint { key, index, point });
        true
    }

    /// Refuses to drop a contour below the three-point floor.
    pub fn remove_point(&mut self, key: ContourKey, index: usize) -> bool {
        let spacing = self.spacing;
        let Some(contour) = self.contours.get_mut(&key) else {
            return false;
        };
        if contour.is_deleted
            || index >= contour.points.len()
            || contour.points.len() <= MIN_CONTOUR_POINTS
        {
            debug!("remove_point on {:?} refused", key);
            return false;
        }
        let point = contour.points.remove(index);
        Self::recompute_area(contour, spacing.as_ref());
        self.history
            .record(SegmentationEditAction::RemovePoint { key, index, point });
        true
    }

    pub fn simplify_contour(&mut self, key: ContourKey, tolerance: Option<f64>) -> bool {
        let tolerance = tolerance.unwrap_or(self.settings.simplify_tolerance_px);
        let Some(contour) = self.contours.get(&key) else {
            return false;
        };
        let simplified = simplify_polyline(&contour.points, tolerance);
        if simplified.len() < MIN_CONTOUR_POINTS {
            return false;
        }
        self.commit_points(key, simplified)
    }

    pub fn smooth_contour(&mut self, key: ContourKey, iterations: usize) -> bool {
        let Some(contour) = self.contours.get(&key) else {
            return false;
        };
        let smoothed = chaikin_smooth(&contour.points, iterations, true);
        self.commit_points(key, smoothed)
    }

    /// Returns the contour to its pre-edit baseline.
    pub fn reset_contour(&mut self, key: ContourKey) -> bool {
        let Some(contour) = self.contours.get(&key) else {
            return false;
        };
        let baseline = contour.original_points.clone();
        self.commit_points(key, baseline)
    }

    /// Soft delete: the contour stays in the store, invisible, until a
    /// restore or a fresh segmentation load.
    pub fn delete_contour(&mut self, key: ContourKey) -> bool {
        let Some(contour) = self.contours.get_mut(&key) else {
            return false;
        };
        if contour.is_deleted {
            return false;
        }
        contour.is_deleted = true;
        contour.visible = false;
        self.history.record(SegmentationEditAction::Delete { key });
        true
    }

    pub fn restore_contour(&mut self, key: ContourKey) -> bool {
        let Some(contour) = self.contours.get_mut(&key) else {
            return false;
        };
        if !contour.is_deleted {
            return false;
        }
        contour.is_deleted = false;
        contour.visible = true;
        self.history.record(SegmentationEditAction::Restore { key });
        true
    }

    // ---- undo / redo ----------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let Some(action) = self.history.pop_undo() else {
            return false;
        };
        self.apply(&action, true);
        self.history.push_redo(action);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.pop_redo() else {
            return false;
        };
        self.apply(&action, false);
        self.history.restore(action);
        true
    }

    fn apply(&mut self, action: &SegmentationEditAction, inverse: bool) {
        let spacing = self.spacing;
        match action {
            SegmentationEditAction::ModifyContour { key, before, after } => {
                if let Some(contour) = self.contours.get_mut(key) {
                    contour.points = if inverse { before.clone() } else { after.clone() };
                    Self::recompute_area(contour, spacing.as_ref());
                }
            }
            SegmentationEditAction::AddPoint { key, index, point } => {
                if let Some(contour) = self.contours.get_mut(key) {
                    if inverse {
                        if *index < contour.points.len() {
                            contour.points.remove(*index);
                        }
                    } else {
                        contour.points.insert(*index, *point);
                    }
                    Self::recompute_area(contour, spacing.as_ref());
                }
            }
            SegmentationEditAction::RemovePoint { key, index, point } => {
                if let Some(contour) = self.contours.get_mut(key) {
                    if inverse {
                        contour.points.insert(*index, *point);
                    } else if *index < contour.points.len() {
                        contour.points.remove(*index);
                    }
                    Self::recompute_area(contour, spacing.as_ref());
                }
            }
            SegmentationEditAction::Delete { key } => {
                if let Some(contour) = self.contours.get_mut(key) {
                    contour.is_deleted = !inverse;
                    contour.visible = inverse;
                }
            }
            SegmentationEditAction::Restore { key } => {
                if let Some(contour) = self.contours.get_mut(key) {
                    contour.is_deleted = inverse;
                    contour.visible = !inverse;
                }
            }
        }
    }
}

#[cfg(test)]
mod contour_store_tests {
    use super::*;
    use crate::utils::test_utils::{points, unit_spacing};
    use approx::assert_relative_eq;

    fn square_result() -> SegmentationResult {
        SegmentationResult {
            instance_uid: "seg-1".to_string(),
            frames: vec![SegmentedFrame {
                frame_index: 0,
                contours: vec![points(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)])],
            }],
        }
    }

    fn loaded_store() -> (SegmentationContourStore, ContourKey) {
        let mut store = SegmentationContourStore::new(Settings::default());
        store.load_result(&square_result(), Some(unit_spacing()));
        (
            store,
            ContourKey {
                frame_index: 0,
                index: 0,
            },
        )
    }

    #[test]
    fn test_load_computes_areas() {
        let (store, key) = loaded_store();
        let contour = store.contour(key).unwrap();
        assert_relative_eq!(contour.area_px2, 16.0);
        assert_relative_eq!(contour.area_mm2.unwrap(), 16.0);
        assert!(!contour.is_modified);
        assert_eq!(store.visible_contours(0).len(), 1);
        assert!(store.visible_contours(1).is_empty());
    }

    #[test]
    fn test_move_point_marks_modified_and_recomputes() {
        let (mut store, key) = loaded_store();
        assert!(store.move_point(key, 2, Point2D::new(8.0, 4.0)));
        let contour = store.contour(key).unwrap();
        assert!(contour.is_modified);
        assert!(contour.area_px2 > 16.0);
        assert!(store.undo());
        let contour = store.contour(key).unwrap();
        assert!(!contour.is_modified);
        assert_relative_eq!(contour.area_px2, 16.0);
    }

    #[test]
    fn test_remove_point_floor() {
        let (mut store, key) = loaded_store();
        assert!(store.remove_point(key, 0));
        // three points left, the floor holds
        assert!(!store.remove_point(key, 0));
        assert_eq!(store.contour(key).unwrap().points.len(), 3);
    }

    #[test]
    fn test_add_point_and_undo() {
        let (mut store, key) = loaded_store();
        assert!(store.add_point(key, 1, Point2D::new(2.0, -1.0)));
        assert_eq!(store.contour(key).unwrap().points.len(), 5);
        assert!(store.undo());
        assert_eq!(store.contour(key).unwrap().points.len(), 4);
        assert!(store.redo());
        assert_eq!(store.contour(key).unwrap().points.len(), 5);
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let (mut store, key) = loaded_store();
        assert!(store.delete_contour(key));
        let contour = store.contour(key).unwrap();
        assert!(contour.is_deleted && !contour.visible);
        assert!(store.visible_contours(0).is_empty());
        // edits on a deleted contour are refused
        assert!(!store.move_point(key, 0, Point2D::new(1.0, 1.0)));
        assert!(!store.delete_contour(key));
        assert!(store.restore_contour(key));
        assert_eq!(store.visible_contours(0).len(), 1);
        // delete/restore are themselves undoable
        assert!(store.undo());
        assert!(store.contour(key).unwrap().is_deleted);
        assert!(store.undo());
        assert!(!store.contour(key).unwrap().is_deleted);
    }

    #[test]
    fn test_reset_returns_to_baseline() {
        let (mut store, key) = loaded_store();
        store.move_point(key, 0, Point2D::new(-5.0, -5.0));
        store.add_point(key, 1, Point2D::new(2.0, -1.0));
        assert!(store.reset_contour(key));
        let contour = store.contour(key).unwrap();
        assert_eq!(contour.points, contour.original_points);
        assert!(!contour.is_modified);
    }

    #[test]
    fn test_smooth_doubles_ring_points() {
        let (mut store, key) = loaded_store();
        assert!(store.smooth_contour(key, 1));
        assert_eq!(store.contour(key).unwrap().points.len(), 8);
    }

    #[test]
    fn test_simplify_respects_floor() {
        let mut store = SegmentationContourStore::new(Settings::default());
        let result = SegmentationResult {
            instance_uid: "seg-2".to_string(),
            frames: vec![SegmentedFrame {
                frame_index: 0,
                contours: vec![points(&[
                    (0.0, 0.0),
                    (2.0, 0.05), // within tolerance of the chord
                    (4.0, 0.0),
                    (4.0, 4.0),
                    (0.0, 4.0),
                ])],
            }],
        };
        store.load_result(&result, Some(unit_spacing()));
        let key = ContourKey {
            frame_index: 0,
            index: 0,
        };
        assert!(store.simplify_contour(key, Some(0.5)));
        assert_eq!(store.contour(key).unwrap().points.len(), 4);
    }

    #[test]
    fn test_fresh_load_clears_history() {
        let (mut store, key) = loaded_store();
        store.move_point(key, 0, Point2D::new(1.0, 1.0));
        assert!(store.can_undo());
        store.load_result(&square_result(), Some(unit_spacing()));
        assert!(!store.can_undo());
        assert!(!store.contour(key).unwrap().is_modified);
    }
}
