use image::DynamicImage;

use crate::detect::backend::EventDetector;
use crate::detect::backends::reference::{ReferenceConfig, ReferenceDetector};
use crate::detect::result::FrameOutcome;
use crate::error::CalibrationError;

/// Hysteresis state of the reference gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateState {
    pub triggered: bool,
    pub miss_count: u32,
}

/// Edge-triggered wrapper around [`ReferenceDetector`].
///
/// Fires once on the first detection of an episode; the episode closes after
/// `reset_frames_no_detection` consecutive frames without a detection.
pub struct Gate {
    detector: ReferenceDetector,
    reset_frames: u32,
    state: GateState,
}

impl Gate {
    pub fn new(config: ReferenceConfig) -> Self {
        let detector = ReferenceDetector::new(config);
        let reset_frames = detector.config().reset_frames_no_detection as u32;
        Self {
            detector,
            reset_frames,
            state: GateState::default(),
        }
    }

    pub fn detector(&self) -> &ReferenceDetector {
        &self.detector
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Rebuild the background model. A successful rebuild also resets the gate.
    pub fn build_background(&mut self, frames: &[DynamicImage]) -> Result<(), CalibrationError> {
        self.detector.build_background(frames)?;
        self.reset();
        Ok(())
    }

    pub fn has_background(&self) -> bool {
        self.detector.has_background()
    }

    /// Run detection on one frame and advance the hysteresis state.
    pub fn process(&mut self, frame: &DynamicImage, include_mask: bool) -> FrameOutcome {
        if frame.width() == 0 || frame.height() == 0 {
            return FrameOutcome::default();
        }

        let result = self.detector.detect(frame, include_mask);
        let mut fired = false;
        if result.detected {
            self.state.miss_count = 0;
            if !self.state.triggered {
                self.state.triggered = true;
                fired = true;
            }
        } else if self.state.triggered {
            self.state.miss_count += 1;
            if self.state.miss_count >= self.reset_frames {
                self.state = GateState::default();
            }
        }
        FrameOutcome { result, fired }
    }
}

impl EventDetector for Gate {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn is_ready(&self) -> bool {
        self.detector.is_ready()
    }

    fn calibrate(&mut self, frames: &[DynamicImage]) -> Result<(), CalibrationError> {
        self.build_background(frames)
    }

    fn process_frame(&mut self, frame: &DynamicImage) -> FrameOutcome {
        let include_mask = self.detector.config().include_mask;
        self.process(frame, include_mask)
    }

    fn reset(&mut self) {
        self.state = GateState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::scene;

    fn calibrated_gate(reset_frames: i32) -> Gate {
        let mut gate = Gate::new(ReferenceConfig {
            reset_frames_no_detection: reset_frames,
            ..ReferenceConfig::default()
        });
        let frames: Vec<DynamicImage> = (0..3).map(|_| scene(100, None)).collect();
        gate.calibrate(&frames).expect("calibration");
        gate
    }

    #[test]
    fn fires_once_per_sustained_detection() {
        let mut gate = calibrated_gate(3);
        let frame = scene(100, Some((45, 45, 10)));

        let outcomes: Vec<FrameOutcome> = (0..5).map(|_| gate.process_frame(&frame)).collect();
        assert!(outcomes.iter().all(FrameOutcome::detected));
        let fired: Vec<bool> = outcomes.iter().map(|o| o.fired).collect();
        assert_eq!(fired, vec![true, false, false, false, false]);
    }

    #[test]
    fn rearms_after_reset_frames_without_detection() {
        let mut gate = calibrated_gate(3);
        let event = scene(100, Some((45, 45, 10)));
        let empty = scene(100, None);

        assert!(gate.process_frame(&event).fired);
        for _ in 0..3 {
            let outcome = gate.process_frame(&empty);
            assert!(!outcome.detected());
            assert!(!outcome.fired);
        }
        assert_eq!(gate.state(), GateState::default());
        assert!(gate.process_frame(&event).fired);
    }

    #[test]
    fn short_gap_does_not_rearm() {
        let mut gate = calibrated_gate(3);
        let event = scene(100, Some((45, 45, 10)));
        let empty = scene(100, None);

        assert!(gate.process_frame(&event).fired);
        gate.process_frame(&empty);
        gate.process_frame(&empty);
        assert_eq!(
            gate.state(),
            GateState {
                triggered: true,
                miss_count: 2
            }
        );

        let outcome = gate.process_frame(&event);
        assert!(outcome.detected());
        assert!(!outcome.fired);
        assert_eq!(gate.state().miss_count, 0);
    }

    #[test]
    fn explicit_reset_rearms_immediately() {
        let mut gate = calibrated_gate(3);
        let event = scene(100, Some((45, 45, 10)));
        assert!(gate.process_frame(&event).fired);
        gate.reset();
        assert!(gate.process_frame(&event).fired);
    }

    #[test]
    fn recalibration_resets_hysteresis() {
        let mut gate = calibrated_gate(3);
        assert!(gate.process_frame(&scene(100, Some((45, 45, 10)))).fired);
        let frames = vec![scene(100, None)];
        gate.calibrate(&frames).expect("recalibration");
        assert!(!gate.state().triggered);
    }

    #[test]
    fn empty_frame_leaves_state_untouched() {
        let mut gate = calibrated_gate(1);
        assert!(gate.process_frame(&scene(100, Some((45, 45, 10)))).fired);
        let empty = DynamicImage::new_luma8(0, 0);
        let outcome = gate.process_frame(&empty);
        assert!(!outcome.detected());
        assert!(gate.state().triggered);
    }

    #[test]
    fn uncalibrated_gate_never_fires() {
        let mut gate = Gate::new(ReferenceConfig::default());
        assert!(!gate.is_ready());
        let outcome = gate.process_frame(&scene(100, Some((45, 45, 10))));
        assert!(!outcome.detected());
        assert!(!outcome.fired);
    }
}
