mod backend;
pub mod backends;
mod result;
pub mod select;

pub use backend::EventDetector;
pub use backends::{
    FastConfig, FastDetector, Gate, GateState, HysteresisState, ReferenceConfig,
    ReferenceDetector,
};
pub use result::{BoundingBox, Centroid, DetectionResult, FrameOutcome};
pub use select::{build_detector, Pipeline};
