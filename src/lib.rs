pub mod config;
pub mod geometry;
pub mod measurement;
pub mod store;
pub mod tracking;
pub mod transform;
pub mod utils;

pub use config::Settings;
pub use geometry::{PixelSpacing, Point2D};
pub use measurement::{Measurement, MeasurementId, MeasurementScope, Shape};
pub use store::{MeasurementStore, SegmentationContourStore, StoreError};
pub use tracking::{TrackingData, TrackingInterpolator};
pub use transform::Transformer;
