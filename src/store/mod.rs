mod contour_store;
mod history;
mod measurement_store;
mod persistence;

pub use contour_store::{
    ContourKey, EditableContour, SegmentationContourStore, SegmentationEditAction,
    SegmentationResult, SegmentedFrame,
};
pub use history::History;
pub use measurement_store::{
    DiscardReason, DrawOutcome, DrawingTool, MeasurementAction, MeasurementStore, NewMeasurement,
};
pub use persistence::{MemoryStorage, Storage, StoreSnapshot};

use thiserror::Error;

use crate::measurement::MeasurementId;

/// Rejections the stores report to callers. Defensive misses (unknown id,
/// locked entity, empty undo stack) are plain no-ops instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("frame-scoped measurements carry a frame key and no other scope may")]
    ScopeFrameKeyMismatch,
    #[error("no measurement with id {0:?}")]
    UnknownMeasurement(MeasurementId),
    #[error("this shape kind does not support cine tracking")]
    TrackingUnsupported,
    #[error("a tracking request for measurement {0:?} is already in flight")]
    TrackingInFlight(MeasurementId),
}
