//! Fast detector: fixed-threshold segmentation on a downscaled frame.
//!
//! Two macro-states. While *acquiring*, frames are downscaled and folded
//! into a background window; once enough have been collected the derived
//! thresholds are fixed and the detector is *ready*. In the ready state each
//! frame is differenced against the background, thresholded at a fixed
//! level, cleaned with open/close, and the largest qualifying connected
//! component is rescaled back to full resolution.
//!
//! Hysteresis fires once per episode, plus a *gap re-fire* when a detection
//! returns after a miss displaced by at least `gap_fire_shift` pixels.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::config::{clamp_param, warn_param};
use crate::detect::backend::EventDetector;
use crate::detect::result::{Centroid, DetectionResult, FrameOutcome};
use crate::error::CalibrationError;
use crate::frame::{to_gray8, FrameSize};
use crate::imaging::{
    abs_diff, box_blur, count_foreground, downscale, open_close, threshold_above, Region, Regions,
};

/// Automatic minimum area, as a fraction of the full-resolution frame.
const AUTO_MIN_AREA_FRAC: f64 = 0.006;
/// Automatic gap shift, as a fraction of the shorter full-resolution side.
const AUTO_GAP_SHIFT_FRAC: f64 = 0.1;

/// Fast-path parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastConfig {
    /// Frames averaged into the fixed background.
    pub bg_frames: i32,
    /// Rolling window length; 0 selects the fixed background.
    pub bg_update_frames: i32,
    /// Consecutive empty frames that close an episode.
    pub reset_frames: i32,
    /// Minimum area in full-resolution pixels; `None` selects 0.6% of the frame.
    pub min_area: Option<f64>,
    /// Additional lower bound as a fraction of the scaled frame area.
    pub min_area_frac: f64,
    pub max_area_frac: f64,
    /// Smallest accepted bounding-box side, full resolution.
    pub min_bbox: i32,
    pub margin: i32,
    /// Fixed cutoff on the absolute difference.
    pub diff_thresh: i32,
    pub blur_radius: i32,
    /// Open/close radius; 0 skips morphology.
    pub morph_radius: i32,
    /// Downscale factor in (0, 1].
    pub scale: f64,
    /// Displacement that turns a post-gap detection into a new episode.
    /// `None` derives it from the frame size and `min_bbox`.
    pub gap_fire_shift: Option<i32>,
}

impl Default for FastConfig {
    fn default() -> Self {
        Self {
            bg_frames: 100,
            bg_update_frames: 50,
            reset_frames: 2,
            min_area: None,
            min_area_frac: 0.0,
            max_area_frac: 0.10,
            min_bbox: 32,
            margin: 5,
            diff_thresh: 15,
            blur_radius: 1,
            morph_radius: 1,
            scale: 0.5,
            gap_fire_shift: None,
        }
    }
}

impl FastConfig {
    pub(crate) fn sanitized(mut self) -> Self {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            warn_param("fast.scale", self.scale, 1.0);
            self.scale = 1.0;
        }
        self.min_area_frac = clamp_param("fast.min_area_frac", self.min_area_frac, 0.0, 1.0);
        self.max_area_frac = clamp_param("fast.max_area_frac", self.max_area_frac, 0.0, 1.0);
        self.bg_frames = clamp_param("fast.bg_frames", self.bg_frames, 1, i32::MAX);
        self.bg_update_frames =
            clamp_param("fast.bg_update_frames", self.bg_update_frames, 0, i32::MAX);
        self.reset_frames = clamp_param("fast.reset_frames", self.reset_frames, 1, i32::MAX);
        self.min_bbox = clamp_param("fast.min_bbox", self.min_bbox, 0, i32::MAX);
        self.margin = clamp_param("fast.margin", self.margin, 0, i32::MAX);
        self.diff_thresh = clamp_param("fast.diff_thresh", self.diff_thresh, 0, 255);
        self.blur_radius = clamp_param("fast.blur_radius", self.blur_radius, 0, i32::MAX);
        self.morph_radius = clamp_param("fast.morph_radius", self.morph_radius, 0, 255);
        self
    }

    fn is_rolling(&self) -> bool {
        self.bg_update_frames > 0
    }

    /// Frames needed before the detector becomes ready.
    fn init_frames(&self) -> u32 {
        if self.is_rolling() {
            self.bg_frames.min(self.bg_update_frames) as u32
        } else {
            self.bg_frames as u32
        }
    }
}

/// Fixed-capacity ring of scaled frames with a per-pixel running sum.
struct RollingBackground {
    capacity: usize,
    slots: Vec<GrayImage>,
    next: usize,
    sum: Vec<u32>,
    size: Option<FrameSize>,
}

impl RollingBackground {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Vec::new(),
            next: 0,
            sum: Vec::new(),
            size: None,
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
        self.sum.clear();
        self.size = None;
    }

    /// Add a frame, evicting the oldest once full. Rejects a size change.
    fn push(&mut self, frame: &GrayImage) -> bool {
        let size = FrameSize::of(frame);
        match self.size {
            None => {
                self.size = Some(size);
                self.sum = vec![0; size.area() as usize];
            }
            Some(expected) if expected != size => return false,
            Some(_) => {}
        }

        if self.slots.len() < self.capacity {
            for (s, &v) in self.sum.iter_mut().zip(frame.iter()) {
                *s += u32::from(v);
            }
            self.slots.push(frame.clone());
        } else {
            let slot = &mut self.slots[self.next];
            for ((s, old), &new) in self.sum.iter_mut().zip(slot.iter_mut()).zip(frame.iter()) {
                *s = *s - u32::from(*old) + u32::from(new);
                *old = new;
            }
        }
        self.next = (self.next + 1) % self.capacity;
        true
    }

    /// Rounded per-pixel mean of the window, written into `out`.
    fn write_mean(&self, out: &mut GrayImage) {
        let n = self.slots.len() as u32;
        if n == 0 {
            return;
        }
        for (o, &s) in out.iter_mut().zip(self.sum.iter()) {
            *o = ((s + n / 2) / n) as u8;
        }
    }

    fn mean(&self) -> Option<GrayImage> {
        let size = self.size?;
        let mut out = GrayImage::new(size.width, size.height);
        self.write_mean(&mut out);
        Some(out)
    }
}

/// Thresholds fixed once the background is ready. Areas and lengths are in
/// scaled pixels unless noted.
#[derive(Clone, Copy, Debug)]
struct DerivedParams {
    full_size: FrameSize,
    area_scale: f64,
    min_area: u64,
    min_area_by_frac: u64,
    max_area: u64,
    margin: u32,
    min_bbox: u32,
    /// Full-resolution pixels.
    gap_fire_shift: f64,
}

impl DerivedParams {
    fn compute(config: &FastConfig, full_size: FrameSize, scaled_size: FrameSize) -> Self {
        let min_area = match config.min_area {
            Some(v) if v > 0.0 => v,
            _ => AUTO_MIN_AREA_FRAC * full_size.area() as f64,
        };
        let area_scale = config.scale * config.scale;
        let min_area_scaled = (min_area * area_scale).max(1.0).ceil() as u64;

        let scaled_area = scaled_size.area() as f64;
        let min_area_by_frac = (config.min_area_frac * scaled_area).round() as u64;
        let max_area = ((config.max_area_frac * scaled_area).round() as u64).max(min_area_scaled);

        let scale_len = |v: i32| ((f64::from(v) * config.scale).round() as u32).max(1);

        let gap_fire_shift = match config.gap_fire_shift {
            Some(v) if v > 0 => v,
            _ => {
                let by_size = (AUTO_GAP_SHIFT_FRAC * f64::from(full_size.min_dim())).round() as i32;
                config.min_bbox.saturating_mul(2).max(by_size)
            }
        };

        Self {
            full_size,
            area_scale,
            min_area: min_area_scaled,
            min_area_by_frac,
            max_area,
            margin: scale_len(config.margin),
            min_bbox: scale_len(config.min_bbox),
            gap_fire_shift: f64::from(gap_fire_shift),
        }
    }

    fn area_ok(&self, area: u64) -> bool {
        area >= self.min_area && area >= self.min_area_by_frac && area <= self.max_area
    }
}

/// Hysteresis fields of the fast path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HysteresisState {
    pub triggered: bool,
    pub miss_count: u32,
    /// Centroid of the most recent detection, full resolution.
    pub last_centroid: Option<Centroid>,
}

/// Throughput-oriented detector with its own background acquisition.
pub struct FastDetector {
    config: FastConfig,
    init_frames: u32,
    collected: u32,
    full_size: Option<FrameSize>,
    window: RollingBackground,
    background: Option<GrayImage>,
    derived: Option<DerivedParams>,
    hysteresis: HysteresisState,
}

impl FastDetector {
    pub fn new(config: FastConfig) -> Self {
        let config = config.sanitized();
        let init_frames = config.init_frames();
        let capacity = if config.is_rolling() {
            config.bg_update_frames
        } else {
            config.bg_frames
        };
        Self {
            window: RollingBackground::new(capacity as usize),
            config,
            init_frames,
            collected: 0,
            full_size: None,
            background: None,
            derived: None,
            hysteresis: HysteresisState::default(),
        }
    }

    pub fn config(&self) -> &FastConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.derived.is_some()
    }

    pub fn background_frames_remaining(&self) -> u32 {
        if self.is_ready() {
            return 0;
        }
        self.init_frames.saturating_sub(self.collected)
    }

    /// Current background in scaled space, once any frame has been folded in.
    pub fn background(&self) -> Option<&GrayImage> {
        self.background.as_ref()
    }

    pub fn hysteresis(&self) -> HysteresisState {
        self.hysteresis
    }

    /// Feed one acquisition frame. Returns whether the detector is ready;
    /// a no-op once it is.
    pub fn add_background_frame(&mut self, frame: &DynamicImage) -> bool {
        if self.is_ready() {
            return true;
        }
        let Some(gray) = to_gray8(frame) else {
            return false;
        };
        self.accumulate(&gray);
        self.is_ready()
    }

    /// Discard the background and hysteresis; acquisition starts over.
    pub fn reset(&mut self) {
        self.collected = 0;
        self.full_size = None;
        self.window.clear();
        self.background = None;
        self.derived = None;
        self.hysteresis = HysteresisState::default();
    }

    pub fn process(&mut self, frame: &DynamicImage) -> FrameOutcome {
        let Some(gray) = to_gray8(frame) else {
            return FrameOutcome::default();
        };
        let Some(params) = self.derived else {
            self.accumulate(&gray);
            return FrameOutcome::default();
        };

        let full = FrameSize::of(&gray);
        if full != params.full_size {
            log::debug!("fast: frame {} does not match {}", full, params.full_size);
            return FrameOutcome::default();
        }

        let scaled = downscale(&gray, self.config.scale);
        let result = match &self.background {
            Some(bg) if bg.dimensions() == scaled.dimensions() => {
                let mut diff = abs_diff(&scaled, bg);
                if self.config.blur_radius > 0 {
                    diff = box_blur(&diff, self.config.blur_radius as u32);
                }
                let found = self.segment(&diff, &params);
                self.rescale(found, &params)
            }
            _ => {
                log::debug!(
                    "fast: scaled frame {}x{} does not match background",
                    scaled.width(),
                    scaled.height()
                );
                return FrameOutcome::default();
            }
        };

        let fired = self.advance(&result, params.gap_fire_shift);

        if self.config.is_rolling() && !self.hysteresis.triggered && !result.detected {
            self.fold_into_background(&scaled);
        }
        FrameOutcome { result, fired }
    }

    fn accumulate(&mut self, gray: &GrayImage) {
        let full = FrameSize::of(gray);
        match self.full_size {
            None => self.full_size = Some(full),
            Some(expected) if expected != full => {
                log::debug!(
                    "fast: acquisition frame {} does not match {}; skipped",
                    full,
                    expected
                );
                return;
            }
            Some(_) => {}
        }

        let scaled = downscale(gray, self.config.scale);
        if !self.window.push(&scaled) {
            return;
        }
        if self.config.is_rolling() {
            self.refresh_background();
        }
        self.collected += 1;

        if self.collected >= self.init_frames {
            if !self.config.is_rolling() {
                self.background = self.window.mean();
                self.window.clear();
            }
            if let Some(bg) = &self.background {
                let params = DerivedParams::compute(&self.config, full, FrameSize::of(bg));
                log::info!(
                    "fast: background ready after {} frames (scaled {}, min_area={}, max_area={}, gap_fire_shift={})",
                    self.collected,
                    FrameSize::of(bg),
                    params.min_area,
                    params.max_area,
                    params.gap_fire_shift
                );
                self.derived = Some(params);
            }
        }
    }

    fn fold_into_background(&mut self, scaled: &GrayImage) {
        if self.window.push(scaled) {
            self.refresh_background();
        }
    }

    fn refresh_background(&mut self) {
        let reusable = match (&self.background, self.window.size) {
            (Some(bg), Some(size)) => bg.dimensions() == (size.width, size.height),
            _ => false,
        };
        if !reusable {
            self.background = self.window.mean();
        } else if let Some(bg) = self.background.as_mut() {
            self.window.write_mean(bg);
        }
    }

    /// Largest qualifying component of the thresholded difference, scaled space.
    fn segment(&self, diff: &GrayImage, params: &DerivedParams) -> DetectionResult {
        let mask = threshold_above(diff, self.config.diff_thresh as u8);
        let mask = open_close(&mask, self.config.morph_radius as u8);

        if !params.area_ok(count_foreground(&mask)) {
            return DetectionResult::none();
        }

        let size = FrameSize::of(&mask);
        let regions = Regions::label(&mask);
        let best = regions
            .iter()
            .filter(|r| params.area_ok(r.area))
            .filter(|r| {
                let bbox = r.bbox();
                bbox.width >= params.min_bbox && bbox.height >= params.min_bbox
            })
            .filter(|r| r.bbox().is_inside(size.width, size.height, params.margin))
            .fold(None, |best: Option<&Region>, r| match best {
                Some(b) if b.area >= r.area => Some(b),
                _ => Some(r),
            });

        match best {
            Some(region) => DetectionResult {
                detected: true,
                area: region.area as f64,
                bbox: region.bbox(),
                centroid: region.centroid(),
                mask: Some(mask),
            },
            None => DetectionResult {
                mask: Some(mask),
                ..DetectionResult::none()
            },
        }
    }

    /// Map a scaled-space detection back to full resolution and re-check it.
    fn rescale(&self, mut result: DetectionResult, params: &DerivedParams) -> DetectionResult {
        let scale = self.config.scale;
        let full = params.full_size;
        if !result.detected || scale == 1.0 {
            return result;
        }
        result.bbox = result.bbox.scaled(1.0 / scale);
        result.area /= params.area_scale;
        result.centroid = Centroid::new(
            (f64::from(result.centroid.x) / scale) as f32,
            (f64::from(result.centroid.y) / scale) as f32,
        );

        let min_bbox = self.config.min_bbox as u32;
        if result.bbox.width < min_bbox || result.bbox.height < min_bbox {
            return DetectionResult::none();
        }
        if !result
            .bbox
            .is_inside(full.width, full.height, self.config.margin as u32)
        {
            return DetectionResult::none();
        }
        result
    }

    /// Advance hysteresis with this frame's result; returns the fire decision.
    fn advance(&mut self, result: &DetectionResult, gap_fire_shift: f64) -> bool {
        let state = &mut self.hysteresis;
        if result.detected {
            let gap_fire = state.triggered
                && state.miss_count > 0
                && gap_fire_shift > 0.0
                && state
                    .last_centroid
                    .is_some_and(|last| last.distance_to(&result.centroid) >= gap_fire_shift);

            state.miss_count = 0;
            state.last_centroid = Some(result.centroid);
            if !state.triggered || gap_fire {
                state.triggered = true;
                return true;
            }
            false
        } else {
            if state.triggered {
                state.miss_count += 1;
                if state.miss_count >= self.config.reset_frames as u32 {
                    state.triggered = false;
                    state.miss_count = 0;
                }
            }
            false
        }
    }
}

impl EventDetector for FastDetector {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn is_ready(&self) -> bool {
        FastDetector::is_ready(self)
    }

    /// Restart acquisition from `frames`. Too few frames leave the detector
    /// acquiring; `process_frame` keeps collecting.
    fn calibrate(&mut self, frames: &[DynamicImage]) -> Result<(), CalibrationError> {
        if frames.is_empty() {
            return Err(CalibrationError::NoFrames);
        }
        FastDetector::reset(self);
        for frame in frames {
            if self.add_background_frame(frame) {
                break;
            }
        }
        if self.collected == 0 && !FastDetector::is_ready(self) {
            return Err(CalibrationError::NoUsableFrames {
                supplied: frames.len(),
            });
        }
        Ok(())
    }

    fn process_frame(&mut self, frame: &DynamicImage) -> FrameOutcome {
        self.process(frame)
    }

    fn reset(&mut self) {
        FastDetector::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::scene;
    use crate::detect::BoundingBox;
    use image::Luma;

    /// Unscaled detector tuned for the 100x100 test scenes.
    fn unscaled_config() -> FastConfig {
        FastConfig {
            bg_frames: 3,
            bg_update_frames: 0,
            reset_frames: 3,
            min_area: Some(40.0),
            min_area_frac: 0.0,
            max_area_frac: 0.1,
            min_bbox: 8,
            margin: 5,
            diff_thresh: 15,
            blur_radius: 0,
            morph_radius: 1,
            scale: 1.0,
            gap_fire_shift: Some(20),
        }
    }

    fn ready(config: FastConfig, size: u32) -> FastDetector {
        let mut detector = FastDetector::new(config);
        let frames: Vec<DynamicImage> = (0..detector.init_frames).map(|_| scene(size, None)).collect();
        detector.calibrate(&frames).expect("calibration");
        assert!(detector.is_ready());
        detector
    }

    fn uniform(size: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(size, size, Luma([value])))
    }

    #[test]
    fn acquisition_completes_after_min_of_window_and_frame_count() {
        let mut detector = FastDetector::new(FastConfig {
            bg_frames: 5,
            bg_update_frames: 3,
            scale: 1.0,
            ..FastConfig::default()
        });
        assert_eq!(detector.background_frames_remaining(), 3);

        assert!(!detector.add_background_frame(&scene(100, None)));
        assert!(!detector.add_background_frame(&scene(100, None)));
        assert!(!detector.is_ready());
        assert_eq!(detector.background_frames_remaining(), 1);

        assert!(detector.add_background_frame(&scene(100, None)));
        assert!(detector.is_ready());
        assert_eq!(detector.background_frames_remaining(), 0);
    }

    #[test]
    fn frames_before_ready_feed_acquisition() {
        let mut detector = FastDetector::new(unscaled_config());
        for _ in 0..3 {
            let outcome = detector.process_frame(&scene(100, Some((45, 45, 10))));
            assert!(!outcome.detected());
            assert!(!outcome.fired);
        }
        assert!(detector.is_ready());
    }

    #[test]
    fn unit_scale_reports_scaled_space_values_exactly() {
        let mut detector = ready(
            FastConfig {
                morph_radius: 0,
                ..unscaled_config()
            },
            100,
        );
        let outcome = detector.process_frame(&scene(100, Some((25, 25, 10))));

        assert!(outcome.detected());
        assert!(outcome.fired);
        let result = &outcome.result;
        assert_eq!(result.bbox, BoundingBox::new(25, 25, 10, 10));
        assert_eq!(result.area, 100.0);
        assert_eq!(result.centroid, Centroid::new(29.5, 29.5));
        assert!(result.mask.is_some());
    }

    #[test]
    fn gap_refire_requires_displacement() {
        let mut detector = ready(unscaled_config(), 100);
        let empty = scene(100, None);

        assert!(detector.process_frame(&scene(100, Some((25, 25, 10)))).fired);
        assert!(!detector.process_frame(&empty).detected());
        let outcome = detector.process_frame(&scene(100, Some((46, 25, 10))));
        assert!(outcome.detected());
        assert!(outcome.fired, "displacement 21 >= shift 20 starts a new episode");

        let mut detector = ready(unscaled_config(), 100);
        assert!(detector.process_frame(&scene(100, Some((25, 25, 10)))).fired);
        detector.process_frame(&empty);
        let outcome = detector.process_frame(&scene(100, Some((44, 25, 10))));
        assert!(outcome.detected());
        assert!(!outcome.fired, "displacement 19 stays in the same episode");
    }

    #[test]
    fn continuous_motion_without_gap_does_not_refire() {
        let mut detector = ready(unscaled_config(), 100);
        assert!(detector.process_frame(&scene(100, Some((25, 25, 10)))).fired);
        let outcome = detector.process_frame(&scene(100, Some((60, 25, 10))));
        assert!(outcome.detected());
        assert!(!outcome.fired);
    }

    #[test]
    fn episode_closes_after_reset_frames() {
        let mut detector = ready(unscaled_config(), 100);
        let event = scene(100, Some((45, 45, 10)));
        assert!(detector.process_frame(&event).fired);
        for _ in 0..3 {
            detector.process_frame(&scene(100, None));
        }
        assert!(!detector.hysteresis().triggered);
        assert!(detector.process_frame(&event).fired);
    }

    #[test]
    fn rejects_small_and_border_components() {
        let mut detector = ready(unscaled_config(), 100);
        assert!(!detector.process_frame(&scene(100, Some((45, 45, 5)))).detected());
        assert!(!detector.process_frame(&scene(100, Some((0, 45, 10)))).detected());
    }

    #[test]
    fn rolling_background_tracks_slow_change() {
        let mut detector = ready(
            FastConfig {
                bg_frames: 2,
                bg_update_frames: 2,
                ..unscaled_config()
            },
            100,
        );
        assert_eq!(detector.background().unwrap().get_pixel(0, 0).0[0], 20);

        // The whole frame exceeds the area bound, so nothing is detected and
        // the frame is folded into the window.
        detector.process_frame(&uniform(100, 40));
        assert_eq!(detector.background().unwrap().get_pixel(0, 0).0[0], 30);
        detector.process_frame(&uniform(100, 40));
        assert_eq!(detector.background().unwrap().get_pixel(0, 0).0[0], 40);
    }

    #[test]
    fn rolling_background_frozen_during_episode() {
        let mut detector = ready(
            FastConfig {
                bg_frames: 2,
                bg_update_frames: 2,
                ..unscaled_config()
            },
            100,
        );
        assert!(detector.process_frame(&scene(100, Some((45, 45, 10)))).fired);
        detector.process_frame(&uniform(100, 40));
        assert!(detector.hysteresis().triggered);
        assert_eq!(detector.background().unwrap().get_pixel(0, 0).0[0], 20);
    }

    #[test]
    fn downscaled_detection_maps_back_to_full_resolution() {
        let mut detector = ready(
            FastConfig {
                bg_frames: 2,
                bg_update_frames: 0,
                ..FastConfig::default()
            },
            200,
        );
        let outcome = detector.process_frame(&scene(200, Some((80, 80, 40))));

        assert!(outcome.fired);
        let result = &outcome.result;
        assert!((74..=80).contains(&result.bbox.x), "bbox {:?}", result.bbox);
        assert!((38..=50).contains(&result.bbox.width), "bbox {:?}", result.bbox);
        assert!((result.centroid.x - 99.5).abs() <= 1.0, "centroid {:?}", result.centroid);
        assert!((1400.0..=2600.0).contains(&result.area), "area {}", result.area);
        let mask = result.mask.as_ref().expect("mask");
        assert_eq!(mask.dimensions(), (100, 100));
    }

    #[test]
    fn size_change_after_ready_is_ignored() {
        let mut detector = ready(unscaled_config(), 100);
        let outcome = detector.process_frame(&scene(80, Some((35, 35, 10))));
        assert!(!outcome.detected());
        assert_eq!(detector.hysteresis(), HysteresisState::default());
    }

    #[test]
    fn reset_restarts_acquisition() {
        let mut detector = ready(unscaled_config(), 100);
        EventDetector::reset(&mut detector);
        assert!(!detector.is_ready());
        assert!(detector.background().is_none());
        assert_eq!(detector.background_frames_remaining(), 3);
    }

    #[test]
    fn calibrate_rejects_unusable_input() {
        let mut detector = FastDetector::new(unscaled_config());
        assert_eq!(detector.calibrate(&[]), Err(CalibrationError::NoFrames));
        let empty = vec![DynamicImage::new_luma8(0, 0)];
        assert_eq!(
            detector.calibrate(&empty),
            Err(CalibrationError::NoUsableFrames { supplied: 1 })
        );
    }

    #[test]
    fn derived_defaults_follow_frame_size() {
        let config = FastConfig {
            scale: 0.5,
            ..FastConfig::default()
        }
        .sanitized();
        let params = DerivedParams::compute(
            &config,
            FrameSize::new(200, 100),
            FrameSize::new(100, 50),
        );
        // 0.6% of 20000 = 120 full-res pixels, a quarter of that scaled.
        assert_eq!(params.min_area, 30);
        assert_eq!(params.max_area, 500);
        assert_eq!(params.margin, 3);
        assert_eq!(params.min_bbox, 16);
        assert_eq!(params.gap_fire_shift, 64.0);
    }

    #[test]
    fn huge_min_bbox_saturates_auto_gap_shift() {
        let config = FastConfig {
            min_bbox: i32::MAX,
            ..FastConfig::default()
        }
        .sanitized();
        let params = DerivedParams::compute(
            &config,
            FrameSize::new(200, 100),
            FrameSize::new(100, 50),
        );
        assert_eq!(params.gap_fire_shift, f64::from(i32::MAX));
    }

    #[test]
    fn out_of_range_parameters_are_clamped() {
        let detector = FastDetector::new(FastConfig {
            scale: 1.5,
            bg_frames: 0,
            bg_update_frames: -3,
            reset_frames: -1,
            diff_thresh: 400,
            ..FastConfig::default()
        });
        let cfg = detector.config();
        assert_eq!(cfg.scale, 1.0);
        assert_eq!(cfg.bg_frames, 1);
        assert_eq!(cfg.bg_update_frames, 0);
        assert_eq!(cfg.reset_frames, 1);
        assert_eq!(cfg.diff_thresh, 255);
    }
}
