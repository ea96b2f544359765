use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::history::History;
use super::persistence::{Storage, StoreSnapshot};
use super::StoreError;
use crate::config::Settings;
use crate::geometry::{hit_test, Hit, PixelSpacing, Point2D};
use crate::measurement::{Measurement, MeasurementId, MeasurementScope, Shape};
use crate::tracking::{
    TrackedFrame, TrackingData, TrackingInterpolator, TrackingRequest, TrackingResponse,
};

/// Payload for creating a measurement; the store assigns the id and the
/// timestamps itself.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub shape: Shape,
    pub scope: MeasurementScope,
    pub label: String,
    pub color: String,
    pub series_uid: String,
    pub frame_key: Option<u32>,
}

/// One reversible store mutation. Each variant carries exactly the data
/// its own inverse needs; `Delete` is the tombstone that lets undo bring
/// the entity and its tracking data back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasurementAction {
    Create {
        measurement: Measurement,
        /// Filled in when the create is undone, so redo can restore the
        /// tracking data id-stably.
        tracking: Option<TrackingData>,
    },
    Update {
        before: Measurement,
        after: Measurement,
    },
    Delete {
        measurement: Measurement,
        tracking: Option<TrackingData>,
    },
    MovePoint {
        id: MeasurementId,
        index: usize,
        before: Point2D,
        after: Point2D,
    },
    Move {
        id: MeasurementId,
        delta: (f64, f64),
    },
    Batch(Vec<MeasurementAction>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingTool {
    Line,
    Polyline,
    Polygon,
    Freehand,
    Ellipse,
    Rectangle,
}

#[derive(Debug, Clone)]
enum DrawingState {
    Idle,
    Drawing {
        tool: DrawingTool,
        points: Vec<Point2D>,
        scope: MeasurementScope,
        series_uid: String,
        frame_key: Option<u32>,
    },
}

/// Why `finish_drawing` refused to commit the session. The invalid attempt
/// is still dropped, but the caller learns the reason instead of a silent
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoActiveDrawing,
    LineTooShort,
    TooFewPoints,
    DegenerateShape,
    InvalidScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Created(MeasurementId),
    Discarded(DiscardReason),
}

/// Canonical owner of the measurement entities for one viewer session.
/// All mutations run synchronously on the calling thread and go through
/// the bounded history; callers only ever receive clones or shared
/// references, never mutable aliases into the store.
#[derive(Debug, Clone)]
pub struct MeasurementStore {
    settings: Settings,
    spacing: Option<PixelSpacing>,
    measurements: BTreeMap<MeasurementId, Measurement>,
    tracking: BTreeMap<MeasurementId, TrackingData>,
    tracking_in_flight: BTreeSet<MeasurementId>,
    selected: Option<MeasurementId>,
    drawing: DrawingState,
    history: History<MeasurementAction>,
    next_id: u64,
}

impl Default for MeasurementStore {
    fn default() -> Self {
        MeasurementStore::new(Settings::default())
    }
}

impl MeasurementStore {
    pub fn new(settings: Settings) -> Self {
        let capacity = settings.max_undo_history;
        MeasurementStore {
            settings,
            spacing: None,
            measurements: BTreeMap::new(),
            tracking: BTreeMap::new(),
            tracking_in_flight: BTreeSet::new(),
            selected: None,
            drawing: DrawingState::Idle,
            history: History::new(capacity),
            next_id: 1,
        }
    }

    pub fn set_pixel_spacing(&mut self, spacing: Option<PixelSpacing>) {
        self.spacing = spacing;
        // physical-unit fields follow the spacing that is now in effect
        for measurement in self.measurements.values_mut() {
            measurement.shape.recompute(spacing.as_ref());
        }
    }

    pub fn pixel_spacing(&self) -> Option<PixelSpacing> {
        self.spacing
    }

    fn alloc_id(&mut self) -> MeasurementId {
        let id = MeasurementId(self.next_id);
        self.next_id += 1;
        id
    }

    // ---- CRUD -----------------------------------------------------------

    pub fn create(&mut self, init: NewMeasurement) -> Result<MeasurementId, StoreError> {
        if init.frame_key.is_some() != (init.scope == MeasurementScope::Frame) {
            return Err(StoreError::ScopeFrameKeyMismatch);
        }
        let id = self.alloc_id();
        let now = Utc::now();
        let mut shape = init.shape;
        shape.recompute(self.spacing.as_ref());
        let measurement = Measurement {
            id,
            shape,
            scope: init.scope,
            label: init.label,
            color: init.color,
            visible: true,
            locked: false,
            created_at: now,
            modified_at: now,
            series_uid: init.series_uid,
            frame_key: init.frame_key,
        };
        info!(
            "created {} measurement {:?} on series {}",
            measurement.shape.kind(),
            id,
            measurement.series_uid
        );
        self.measurements.insert(id, measurement.clone());
        self.history.record(MeasurementAction::Create {
            measurement,
            tracking: None,
        });
        Ok(id)
    }

    /// Applies `mutate` to a copy of the measurement and commits it as one
    /// undoable update. Unknown or locked ids are a no-op (`Ok(false)`);
    /// an update that breaks the scope/frame-key invariant is rejected.
    pub fn update(
        &mut self,
        id: MeasurementId,
        mutate: impl FnOnce(&mut Measurement),
    ) -> Result<bool, StoreError> {
        let Some(current) = self.measurements.get(&id) else {
            debug!("update on unknown measurement {:?} ignored", id);
            return Ok(false);
        };
        if current.locked {
            debug!("update on locked measurement {:?} ignored", id);
            return Ok(false);
        }
        let before = current.clone();
        let mut after = before.clone();
        mutate(&mut after);
        after.id = before.id;
        after.created_at = before.created_at;
        if !after.scope_is_consistent() {
            return Err(StoreError::ScopeFrameKeyMismatch);
        }
        after.shape.recompute(self.spacing.as_ref());
        after.touch();
        self.measurements.insert(id, after.clone());
        self.history.record(MeasurementAction::Update { before, after });
        Ok(true)
    }

    pub fn delete(&mut self, id: MeasurementId) -> bool {
        let Some(measurement) = self.measurements.remove(&id) else {
            debug!("delete on unknown measurement {:?} ignored", id);
            return false;
        };
        let tracking = self.tracking.remove(&id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        info!("deleted measurement {:?}", id);
        self.history.record(MeasurementAction::Delete {
            measurement,
            tracking,
        });
        true
    }

    pub fn move_measurement(&mut self, id: MeasurementId, dx: f64, dy: f64) -> bool {
        let spacing = self.spacing;
        let Some(m) = self.measurements.get_mut(&id) else {
            return false;
        };
        if m.locked {
            return false;
        }
        m.shape.translate(dx, dy);
        m.shape.recompute(spacing.as_ref());
        m.touch();
        self.history.record(MeasurementAction::Move {
            id,
            delta: (dx, dy),
        });
        true
    }

    pub fn move_point(&mut self, id: MeasurementId, index: usize, target: Point2D) -> bool {
        let spacing = self.spacing;
        let Some(m) = self.measurements.get_mut(&id) else {
            return false;
        };
        if m.locked {
            return false;
        }
        let Some(before) = m.shape.control_points().get(index).copied() else {
            return false;
        };
        if !m.shape.move_point(index, target) {
            return false;
        }
        m.shape.recompute(spacing.as_ref());
        m.touch();
        self.history.record(MeasurementAction::MovePoint {
            id,
            index,
            before,
            after: target,
        });
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
        let action = self.apply_inverse(action);
        self.history.push_redo(action);
        debug!("undo applied, {} entries remain", self.history.undo_len());
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.pop_redo() else {
            return false;
        };
        let action = self.apply_forward(action);
        self.history.restore(action);
        true
    }

    fn apply_inverse(&mut self, action: MeasurementAction) -> MeasurementAction {
        match action {
            MeasurementAction::Create { measurement, .. } => {
                let id = measurement.id;
                self.measurements.remove(&id);
                // tracking data is keyed by the measurement id, so the
                // create-undo rolls it back as well
                let tracking = self.tracking.remove(&id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
                MeasurementAction::Create {
                    measurement,
                    tracking,
                }
            }
            MeasurementAction::Update { before, after } => {
                self.measurements.insert(before.id, before.clone());
                MeasurementAction::Update { before, after }
            }
            MeasurementAction::Delete {
                measurement,
                tracking,
            } => {
                self.measurements
                    .insert(measurement.id, measurement.clone());
                if let Some(data) = tracking.clone() {
                    self.tracking.insert(measurement.id, data);
                }
                MeasurementAction::Delete {
                    measurement,
                    tracking,
                }
            }
            MeasurementAction::MovePoint {
                id,
                index,
                before,
                after,
            } => {
                let spacing = self.spacing;
                if let Some(m) = self.measurements.get_mut(&id) {
                    m.shape.move_point(index, before);
                    m.shape.recompute(spacing.as_ref());
                    m.touch();
                }
                MeasurementAction::MovePoint {
                    id,
                    index,
                    before,
                    after,
                }
            }
            MeasurementAction::Move { id, delta } => {
                let spacing = self.spacing;
                if let Some(m) = self.measurements.get_mut(&id) {
                    m.shape.translate(-delta.0, -delta.1);
                    m.shape.recompute(spacing.as_ref());
                    m.touch();
                }
                MeasurementAction::Move { id, delta }
            }
            MeasurementAction::Batch(actions) => {
                let mut inverted: Vec<MeasurementAction> = actions
                    .into_iter()
                    .rev()
                    .map(|a| self.apply_inverse(a))
                    .collect();
                inverted.reverse();
                MeasurementAction::Batch(inverted)
            }
        }
    }

    fn apply_forward(&mut self, action: MeasurementAction) -> MeasurementAction {
        match action {
            MeasurementAction::Create {
                measurement,
                tracking,
            } => {
                self.measurements
                    .insert(measurement.id, measurement.clone());
                if let Some(data) = tracking.clone() {
                    self.tracking.insert(measurement.id, data);
                }
                MeasurementAction::Create {
                    measurement,
                    tracking,
                }
            }
            MeasurementAction::Update { before, after } => {
                self.measurements.insert(after.id, after.clone());
                MeasurementAction::Update { before, after }
            }
            MeasurementAction::Delete {
                measurement,
                tracking,
            } => {
                self.measurements.remove(&measurement.id);
                self.tracking.remove(&measurement.id);
                if self.selected == Some(measurement.id) {
                    self.selected = None;
                }
                MeasurementAction::Delete {
                    measurement,
                    tracking,
                }
            }
            MeasurementAction::MovePoint {
                id,
                index,
                before,
                after,
            } => {
                let spacing = self.spacing;
                if let Some(m) = self.measurements.get_mut(&id) {
                    m.shape.move_point(index, after);
                    m.shape.recompute(spacing.as_ref());
                    m.touch();
                }
                MeasurementAction::MovePoint {
                    id,
                    index,
                    before,
                    after,
                }
            }
            MeasurementAction::Move { id, delta } => {
                let spacing = self.spacing;
                if let Some(m) = self.measurements.get_mut(&id) {
                    m.shape.translate(delta.0, delta.1);
                    m.shape.recompute(spacing.as_ref());
                    m.touch();
                }
                MeasurementAction::Move { id, delta }
            }
            MeasurementAction::Batch(actions) => MeasurementAction::Batch(
                actions
                    .into_iter()
                    .map(|a| self.apply_forward(a))
                    .collect(),
            ),
        }
    }

    // ---- selection & visibility ----------------------------------------

    /// Pure navigation; never touches the history.
    pub fn select(&mut self, id: Option<MeasurementId>) -> bool {
        if let Some(id) = id {
            if !self.measurements.contains_key(&id) {
                return false;
            }
        }
        self.selected = id;
        true
    }

    pub fn selected(&self) -> Option<MeasurementId> {
        self.selected
    }

    pub fn toggle_visibility(&mut self, id: MeasurementId) -> bool {
        let Some(current) = self.measurements.get(&id) else {
            return false;
        };
        let before = current.clone();
        let mut after = before.clone();
        after.visible = !after.visible;
        after.touch();
        self.measurements.insert(id, after.clone());
        self.history.record(MeasurementAction::Update { before, after });
        true
    }

    /// Shows or hides every measurement, optionally restricted to one
    /// series. Recorded as a single batch so one undo reverses the sweep.
    pub fn set_all_visible(&mut self, visible: bool, series_uid: Option<&str>) -> usize {
        let ids: Vec<MeasurementId> = self
            .measurements
            .values()
            .filter(|m| series_uid.map_or(true, |s| m.series_uid == s))
            .filter(|m| m.visible != visible)
            .map(|m| m.id)
            .collect();
        if ids.is_empty() {
            return 0;
        }
        let mut actions = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(current) = self.measurements.get(id) {
                let before = current.clone();
                let mut after = before.clone();
                after.visible = visible;
                after.touch();
                self.measurements.insert(*id, after.clone());
                actions.push(MeasurementAction::Update { before, after });
            }
        }
        let count = actions.len();
        self.history.record(MeasurementAction::Batch(actions));
        count
    }

    // ---- queries --------------------------------------------------------

    pub fn get(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.get(&id)
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurements_for_series(&self, series_uid: &str) -> Vec<&Measurement> {
        self.measurements
            .values()
            .filter(|m| m.series_uid == series_uid)
            .collect()
    }

    pub fn measurements_for_frame(&self, series_uid: &str, frame_key: u32) -> Vec<&Measurement> {
        self.measurements
            .values()
            .filter(|m| m.applies_to_frame(series_uid, frame_key))
            .collect()
    }

    pub fn visible_measurements(&self, series_uid: &str, frame_key: u32) -> Vec<&Measurement> {
        self.measurements
            .values()
            .filter(|m| m.visible && m.applies_to_frame(series_uid, frame_key))
            .collect()
    }

    /// Picks the measurement part under an image-space point among the
    /// measurements visible on the given frame.
    pub fn hit_test_frame(
        &self,
        point: &Point2D,
        series_uid: &str,
        frame_key: u32,
    ) -> Option<Hit> {
        let candidates = self.visible_measurements(series_uid, frame_key);
        hit_test(point, &candidates, self.settings.hit_tolerance_px)
    }

    // ---- drawing session ------------------------------------------------

    pub fn begin_drawing(
        &mut self,
        tool: DrawingTool,
        scope: MeasurementScope,
        series_uid: &str,
        frame_key: Option<u32>,
        start: Point2D,
    ) -> Result<(), StoreError> {
        if frame_key.is_some() != (scope == MeasurementScope::Frame) {
            return Err(StoreError::ScopeFrameKeyMismatch);
        }
        if matches!(self.drawing, DrawingState::Drawing { .. }) {
            debug!("previous drawing session cancelled by a new one");
        }
        self.drawing = DrawingState::Drawing {
            tool,
            points: vec![start],
            scope,
            series_uid: series_uid.to_string(),
            frame_key,
        };
        Ok(())
    }

    /// Updates the live preview point (the rubber-band endpoint).
    pub fn continue_drawing(&mut self, point: Point2D) -> bool {
        let DrawingState::Drawing { points, .. } = &mut self.drawing else {
            return false;
        };
        if points.len() == 1 {
            points.push(point);
        } else if let Some(last) = points.last_mut() {
            *last = point;
        }
        true
    }

    /// Commits a vertex (polygon/polyline corner, freehand sample).
    pub fn add_drawing_point(&mut self, point: Point2D) -> bool {
        let DrawingState::Drawing { points, .. } = &mut self.drawing else {
            return false;
        };
        points.push(point);
        true
    }

    pub fn cancel_drawing(&mut self) -> bool {
        match std::mem::replace(&mut self.drawing, DrawingState::Idle) {
            DrawingState::Drawing { .. } => true,
            DrawingState::Idle => false,
        }
    }

    pub fn drawing_preview(&self) -> Option<(DrawingTool, &[Point2D])> {
        match &self.drawing {
            DrawingState::Drawing { tool, points, .. } => Some((*tool, points.as_slice())),
            DrawingState::Idle => None,
        }
    }

    /// Live area and perimeter of the in-progress polygon, for overlay
    /// labels that follow the cursor. None unless a polygon with enough
    /// vertices is being drawn.
    pub fn drawing_preview_metrics(&self) -> Option<(f64, f64)> {
        let DrawingState::Drawing {
            tool: DrawingTool::Polygon,
            points,
            ..
        } = &self.drawing
        else {
            return None;
        };
        let spacing = self.spacing.as_ref();
        let area = crate::geometry::polygon_area_mm2(points, spacing)?;
        let perimeter = crate::geometry::perimeter_mm(points, spacing, true)?;
        Some((area, perimeter))
    }

    /// Validates and commits the active drawing session. Invalid attempts
    /// (too-short line, under-populated polygon, degenerate box) are
    /// dropped, with the reason surfaced in the outcome.
    pub fn finish_drawing(&mut self) -> DrawOutcome {
        let state = std::mem::replace(&mut self.drawing, DrawingState::Idle);
        let DrawingState::Drawing {
            tool,
            points,
            scope,
            series_uid,
            frame_key,
        } = state
        else {
            return DrawOutcome::Discarded(DiscardReason::NoActiveDrawing);
        };

        let shape = match self.build_shape(tool, &points) {
            Ok(shape) => shape,
            Err(reason) => {
                debug!("drawing discarded: {:?}", reason);
                return DrawOutcome::Discarded(reason);
            }
        };

        let init = NewMeasurement {
            shape,
            scope,
            label: format!("{:?} {}", tool, self.next_id),
            color: DEFAULT_COLOR.to_string(),
            series_uid,
            frame_key,
        };
        match self.create(init) {
            Ok(id) => DrawOutcome::Created(id),
            Err(err) => {
                warn!("finish_drawing rejected by create: {}", err);
                DrawOutcome::Discarded(DiscardReason::InvalidScope)
            }
        }
    }

    fn build_shape(&self, tool: DrawingTool, points: &[Point2D]) -> Result<Shape, DiscardReason> {
        match tool {
            DrawingTool::Line => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return Err(DiscardReason::TooFewPoints);
                };
                if points.len() < 2
                    || first.distance_to(last) < self.settings.min_line_length_px
                {
                    return Err(DiscardReason::LineTooShort);
                }
                Ok(Shape::Line {
                    points: [*first, *last],
                    length_mm: None,
                })
            }
            DrawingTool::Polyline => {
                if points.len() < 2 {
                    return Err(DiscardReason::TooFewPoints);
                }
                Ok(Shape::Polyline {
                    points: points.to_vec(),
                    total_length_mm: None,
                    segment_lengths_mm: None,
                })
            }
            DrawingTool::Polygon => {
                if points.len() < 3 {
                    return Err(DiscardReason::TooFewPoints);
                }
                Ok(Shape::Polygon {
                    points: points.to_vec(),
                    area_mm2: None,
                    perimeter_mm: None,
                    volume: None,
                })
            }
            DrawingTool::Freehand => {
                if points.len() < 2 {
                    return Err(DiscardReason::TooFewPoints);
                }
                Ok(Shape::Freehand {
                    points: points.to_vec(),
                    closed: points.len() >= 3,
                    area_mm2: None,
                    length_mm: None,
                })
            }
            DrawingTool::Ellipse => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return Err(DiscardReason::TooFewPoints);
                };
                let radius_x = (last.x - first.x).abs() / 2.0;
                let radius_y = (last.y - first.y).abs() / 2.0;
                if radius_x * 2.0 < self.settings.min_line_length_px
                    || radius_y * 2.0 < self.settings.min_line_length_px
                {
                    return Err(DiscardReason::DegenerateShape);
                }
                Ok(Shape::Ellipse {
                    center: first.midpoint(last),
                    radius_x,
                    radius_y,
                    rotation_deg: 0.0,
                    area_mm2: None,
                })
            }
            DrawingTool::Rectangle => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return Err(DiscardReason::TooFewPoints);
                };
                let width = (last.x - first.x).abs();
                let height = (last.y - first.y).abs();
                if width < self.settings.min_line_length_px
                    || height < self.settings.min_line_length_px
                {
                    return Err(DiscardReason::DegenerateShape);
                }
                Ok(Shape::Rectangle {
                    top_left: Point2D::new(first.x.min(last.x), first.y.min(last.y)),
                    bottom_right: Point2D::new(first.x.max(last.x), first.y.max(last.y)),
                    area_mm2: None,
                })
            }
        }
    }

    // ---- tracking -------------------------------------------------------

    /// Admits one tracking request for the measurement and returns the
    /// request payload for the external collaborator. A second request for
    /// the same id is rejected rather than queued.
    pub fn begin_tracking(&mut self, id: MeasurementId) -> Result<TrackingRequest, StoreError> {
        let Some(m) = self.measurements.get(&id) else {
            return Err(StoreError::UnknownMeasurement(id));
        };
        if !m.shape.supports_tracking() {
            return Err(StoreError::TrackingUnsupported);
        }
        if !self.tracking_in_flight.insert(id) {
            return Err(StoreError::TrackingInFlight(id));
        }
        Ok(TrackingRequest {
            start_frame_index: m.frame_key.unwrap_or(0),
            points: m.shape.control_points(),
            track_full_loop: true,
        })
    }

    /// Merges a collaborator response. The result is discarded when the
    /// measurement was deleted while the request was in flight.
    pub fn complete_tracking(&mut self, id: MeasurementId, response: TrackingResponse) -> bool {
        self.tracking_in_flight.remove(&id);
        let Some(m) = self.measurements.get(&id) else {
            debug!(
                "tracking result for deleted measurement {:?} discarded",
                id
            );
            return false;
        };
        let mut frames = response.frames;
        frames.sort_by_key(|f| f.frame_index);
        frames.dedup_by_key(|f| f.frame_index);
        let total_frames = frames.last().map_or(0, |f| f.frame_index + 1);
        let mut data = TrackingData {
            series_uid: m.series_uid.clone(),
            total_frames,
            frames,
            summary: response.summary,
        };
        if data.summary.is_none() {
            data.summarize();
        }
        info!(
            "tracking data for {:?}: {} sampled frames",
            id,
            data.frames.len()
        );
        self.tracking.insert(id, data);
        true
    }

    pub fn fail_tracking(&mut self, id: MeasurementId) {
        if self.tracking_in_flight.remove(&id) {
            warn!("tracking request for {:?} failed", id);
        }
    }

    pub fn tracking_in_flight(&self, id: MeasurementId) -> bool {
        self.tracking_in_flight.contains(&id)
    }

    pub fn tracking_for(&self, id: MeasurementId) -> Option<&TrackingData> {
        self.tracking.get(&id)
    }

    pub fn interpolator_for(&self, id: MeasurementId) -> Option<TrackingInterpolator> {
        self.tracking
            .get(&id)
            .map(|data| TrackingInterpolator::new(&data.frames))
    }

    /// Tracking samples with the configured temporal smoothing window
    /// applied, ready for cine playback.
    pub fn smoothed_tracking_for(&self, id: MeasurementId) -> Option<Vec<TrackedFrame>> {
        self.interpolator_for(id)
            .map(|interp| interp.smoothed(self.settings.smoothing_window))
    }

    // ---- import / export / persistence ---------------------------------

    /// Upserts measurements by id, never regenerating ids. Recorded as one
    /// batch so the whole import undoes in a single step.
    pub fn import_measurements(&mut self, list: Vec<Measurement>) -> Result<usize, StoreError> {
        for m in &list {
            if !m.scope_is_consistent() {
                return Err(StoreError::ScopeFrameKeyMismatch);
            }
        }
        let mut actions = Vec::with_capacity(list.len());
        for m in list {
            self.next_id = self.next_id.max(m.id.0 + 1);
            match self.measurements.insert(m.id, m.clone()) {
                Some(before) => actions.push(MeasurementAction::Update { before, after: m }),
                None => actions.push(MeasurementAction::Create {
                    measurement: m,
                    tracking: None,
                }),
            }
        }
        let count = actions.len();
        if count > 0 {
            self.history.record(MeasurementAction::Batch(actions));
        }
        info!("imported {} measurements", count);
        Ok(count)
    }

    pub fn export_measurements(&self, series_uid: Option<&str>) -> Vec<Measurement> {
        self.measurements
            .values()
            .filter(|m| series_uid.map_or(true, |s| m.series_uid == s))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            measurements: self.measurements.values().cloned().collect(),
            tracking: self
                .tracking
                .iter()
                .map(|(id, data)| (*id, data.clone()))
                .collect(),
        }
    }

    /// Replaces the whole store content; history, selection and any
    /// drawing session are reset.
    pub fn restore_snapshot(&mut self, snapshot: StoreSnapshot) -> Result<(), StoreError> {
        for m in &snapshot.measurements {
            if !m.scope_is_consistent() {
                return Err(StoreError::ScopeFrameKeyMismatch);
            }
        }
        self.measurements = snapshot
            .measurements
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        self.tracking = snapshot.tracking.into_iter().collect();
        self.next_id = self
            .measurements
            .keys()
            .last()
            .map_or(1, |id| id.0 + 1);
        self.selected = None;
        self.drawing = DrawingState::Idle;
        self.tracking_in_flight.clear();
        self.history.clear();
        Ok(())
    }

    pub fn save_to(&self, storage: &mut dyn Storage, key: &str) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&self.snapshot())?;
        storage.set_item(key, &payload)
    }

    /// Returns false when the key holds nothing.
    pub fn load_from(&mut self, storage: &dyn Storage, key: &str) -> anyhow::Result<bool> {
        let Some(raw) = storage.get_item(key)? else {
            return Ok(false);
        };
        let snapshot: StoreSnapshot = serde_json::from_str(&raw)?;
        self.restore_snapshot(snapshot)?;
        Ok(true)
    }
}

const DEFAULT_COLOR: &str = "#ffcc00";
