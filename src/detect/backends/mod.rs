pub mod fast;
pub mod gate;
pub mod reference;

pub use fast::{FastConfig, FastDetector, HysteresisState};
pub use gate::{Gate, GateState};
pub use reference::{ReferenceConfig, ReferenceDetector};
