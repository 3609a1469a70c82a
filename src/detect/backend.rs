use image::DynamicImage;

use crate::detect::result::FrameOutcome;
use crate::error::CalibrationError;

/// Frame-in, fire-decision-out capability shared by both detection paths.
///
/// # Call discipline
///
/// Implementations carry mutable per-stream state (background, rolling
/// window, hysteresis counters). One instance serves exactly one frame
/// stream; calls must be serialized, each frame fully processed before the
/// next is submitted. Analyze several cameras with several instances.
///
/// No method panics or fails on bad frames: empty frames, size mismatches
/// and degenerate contrast all resolve to "nothing detected".
pub trait EventDetector: Send {
    /// Detector identifier.
    fn name(&self) -> &'static str;

    /// True once the detector has everything it needs to detect.
    fn is_ready(&self) -> bool;

    /// Consume calibration frames captured with no event in view.
    ///
    /// Resets hysteresis state. A detector that needs more frames than were
    /// supplied stays unready and keeps acquiring from `process_frame`.
    fn calibrate(&mut self, frames: &[DynamicImage]) -> Result<(), CalibrationError>;

    /// Analyze one frame and advance the hysteresis state.
    fn process_frame(&mut self, frame: &DynamicImage) -> FrameOutcome;

    /// Clear per-stream state after a stream restart.
    ///
    /// The reference gate keeps its background model; the fast detector
    /// discards its background and starts acquiring again.
    fn reset(&mut self);
}
