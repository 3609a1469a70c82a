//! Event Gate
//!
//! This crate implements the detection-and-gating core that sits between an
//! instrument camera and a hardware trigger: it decides, frame by frame,
//! whether an object is fully inside the field of view and emits a one-shot
//! fire signal the instant a new event is recognized.
//!
//! # Architecture
//!
//! Two detection paths share one contract ([`EventDetector`]):
//!
//! 1. **Reference**: background model (mean/median/max/min or local
//!    high-pass), percentile contrast stretch, Otsu binarization, filled
//!    regions, wrapped in a hysteresis [`Gate`].
//! 2. **Fast**: downscaled fixed-threshold differencing against a fixed or
//!    rolling background, connected-component selection, and hysteresis with
//!    gap re-fire.
//!
//! The invariants both paths keep:
//!
//! - **Fire once per episode**: a sustained detection fires on its first frame only.
//! - **Bad input is not an error**: empty frames, size mismatches and
//!   collapsed contrast yield "no detection" and the stream continues.
//! - **Self-correcting configuration**: out-of-range parameters are clamped
//!   with a warning, never rejected.
//! - **One instance per stream**: detectors own their state; calls are serialized.
//!
//! # Module Structure
//!
//! - `frame`: 8-bit normalization and frame sizes
//! - `background`: background model builder
//! - `imaging`: raster primitives shared by both paths
//! - `detect`: detectors, gate, results, pipeline selection
//! - `ingest`: frame sources (image directories, `stub://`)
//! - `sink`: trigger and classification sinks
//! - `runner`: calibrate-then-detect host loop
//! - `config`: file + environment configuration

pub mod background;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod imaging;
pub mod ingest;
pub mod runner;
pub mod sink;

pub use background::{build_background, BackgroundModel, BackgroundPolicy};
pub use config::{EventGateConfig, SourceSettings};
pub use detect::{
    build_detector, BoundingBox, Centroid, DetectionResult, EventDetector, FastConfig,
    FastDetector, FrameOutcome, Gate, GateState, HysteresisState, Pipeline, ReferenceConfig,
    ReferenceDetector,
};
pub use error::CalibrationError;
pub use frame::{to_gray8, FrameSize};
pub use ingest::{open_source, DirectorySource, FrameSource, SyntheticConfig, SyntheticSource};
pub use runner::{calibrate, run, RunSummary};
pub use sink::{ClassificationSink, CropSink, JsonLinesSink, LogTrigger, TriggerSink};
