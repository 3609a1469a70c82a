//! Reference detector: adaptive single-frame segmentation.
//!
//! Per frame: difference against the background (or a blur of the frame
//! itself under the local policy), percentile contrast stretch, Otsu
//! binarization, open/close, filled external regions, then the largest
//! region that fits the area bounds and clears the border margin.

use image::{DynamicImage, GrayImage};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

use crate::background::{
    build_background, BackgroundModel, BackgroundPolicy, DEFAULT_MEDIAN_MAX_ELEMENTS,
};
use crate::config::{clamp_param, warn_param};
use crate::detect::result::DetectionResult;
use crate::error::CalibrationError;
use crate::frame::{to_gray8, FrameSize};
use crate::imaging::{
    fill_holes, open_close, otsu_mask, stretch_to_u8, to_unit_float, FloatImage, Region,
    Regions,
};

const DEFAULT_SIGMA: f64 = 1.0;

/// Reference-path parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Smallest candidate area, in pixels.
    pub min_area: f64,
    /// Regions smaller than this are dropped from the cleaned mask.
    pub min_mask_area: f64,
    /// Largest candidate area as a fraction of the frame area.
    pub max_area_frac: f64,
    /// Candidates must clear every edge by more than this many pixels.
    pub border_margin: i32,
    /// Gaussian sigma for noise suppression / high-pass filtering.
    pub sigma: f64,
    pub morph_radius: i32,
    /// Symmetric percentile clip for the contrast stretch, in [0, 0.5).
    pub contrast_clip: f64,
    pub bg_mode: BackgroundPolicy,
    /// Median policy ceiling on `frames × pixels`.
    pub median_max_elements: u64,
    /// Attach the cleaned foreground mask to every result.
    pub include_mask: bool,
    /// Consecutive empty frames that close an episode.
    pub reset_frames_no_detection: i32,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            min_area: 40.0,
            min_mask_area: 20.0,
            max_area_frac: 0.10,
            border_margin: 5,
            sigma: DEFAULT_SIGMA,
            morph_radius: 2,
            contrast_clip: 0.01,
            bg_mode: BackgroundPolicy::Mean,
            median_max_elements: DEFAULT_MEDIAN_MAX_ELEMENTS,
            include_mask: false,
            reset_frames_no_detection: 3,
        }
    }
}

impl ReferenceConfig {
    /// Clamp out-of-range values to safe ones, logging each correction.
    pub(crate) fn sanitized(mut self) -> Self {
        if !(self.sigma > 0.0) {
            warn_param("reference.sigma", self.sigma, DEFAULT_SIGMA);
            self.sigma = DEFAULT_SIGMA;
        }
        self.morph_radius = clamp_param("reference.morph_radius", self.morph_radius, 1, 255);
        self.border_margin = clamp_param("reference.border_margin", self.border_margin, 0, i32::MAX);
        self.max_area_frac = clamp_param("reference.max_area_frac", self.max_area_frac, 0.0, 1.0);
        self.min_area = clamp_param("reference.min_area", self.min_area, 0.0, f64::MAX);
        self.min_mask_area = clamp_param("reference.min_mask_area", self.min_mask_area, 0.0, f64::MAX);
        self.reset_frames_no_detection = clamp_param(
            "reference.reset_frames_no_detection",
            self.reset_frames_no_detection,
            1,
            i32::MAX,
        );
        self
    }
}

/// Single-frame foreground segmentation against a static or local background.
pub struct ReferenceDetector {
    config: ReferenceConfig,
    background: Option<BackgroundModel>,
}

impl ReferenceDetector {
    pub fn new(config: ReferenceConfig) -> Self {
        Self {
            config: config.sanitized(),
            background: None,
        }
    }

    pub fn config(&self) -> &ReferenceConfig {
        &self.config
    }

    /// Build (or rebuild) the background model.
    ///
    /// On failure the previous model, if any, is left in place.
    pub fn build_background(&mut self, frames: &[DynamicImage]) -> Result<(), CalibrationError> {
        self.background = build_background(
            frames,
            self.config.bg_mode,
            self.config.median_max_elements,
        )?;
        Ok(())
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    pub fn background(&self) -> Option<&BackgroundModel> {
        self.background.as_ref()
    }

    /// Local policy needs no model; every other policy does.
    pub fn is_ready(&self) -> bool {
        self.config.bg_mode.is_local() || self.background.is_some()
    }

    /// Detect the dominant fully-visible object in one frame.
    ///
    /// `include_mask` attaches the cleaned foreground mask to the result;
    /// rendering it costs a full pass over the label image.
    pub fn detect(&self, frame: &DynamicImage, include_mask: bool) -> DetectionResult {
        let Some(gray) = to_gray8(frame) else {
            log::debug!("reference: empty frame");
            return DetectionResult::none();
        };
        let size = FrameSize::of(&gray);
        let Some(diff) = self.difference(&gray, size) else {
            return DetectionResult::none();
        };

        let Some(stretched) = stretch_to_u8(&diff, self.config.contrast_clip) else {
            log::debug!("reference: contrast range collapsed");
            return DetectionResult {
                mask: include_mask.then(|| GrayImage::new(size.width, size.height)),
                ..DetectionResult::none()
            };
        };

        let radius = self.config.morph_radius as u8;
        let mask = open_close(&otsu_mask(&stretched), radius);
        let mut regions = Regions::label(&fill_holes(&mask));
        let min_mask_area = self.config.min_mask_area;
        regions.retain(|r| r.area as f64 >= min_mask_area);

        let cleaned = include_mask.then(|| regions.to_mask());
        let best = self.select(&regions, size);

        match best {
            Some(region) => DetectionResult {
                detected: true,
                area: region.area as f64,
                bbox: region.bbox(),
                centroid: region.centroid(),
                mask: cleaned,
            },
            None => DetectionResult {
                mask: cleaned,
                ..DetectionResult::none()
            },
        }
    }

    fn difference(&self, gray: &GrayImage, size: FrameSize) -> Option<FloatImage> {
        let sigma = self.config.sigma as f32;
        let mut intensity = to_unit_float(gray);

        if self.config.bg_mode.is_local() {
            let blurred = gaussian_blur_f32(&intensity, sigma);
            for (v, &b) in intensity.iter_mut().zip(blurred.iter()) {
                *v -= b;
            }
            return Some(intensity);
        }

        let Some(background) = &self.background else {
            log::debug!("reference: no background model yet");
            return None;
        };
        if background.size() != size {
            log::debug!(
                "reference: frame size {} does not match background {}",
                size,
                background.size()
            );
            return None;
        }
        for (v, &b) in intensity.iter_mut().zip(background.image().iter()) {
            *v = (*v - b).abs();
        }
        Some(gaussian_blur_f32(&intensity, sigma))
    }

    /// Largest region within the area bounds whose box clears the margin.
    fn select<'a>(&self, regions: &'a Regions, size: FrameSize) -> Option<&'a Region> {
        let max_area = self.config.max_area_frac * size.area() as f64;
        let margin = self.config.border_margin as u32;
        regions
            .iter()
            .filter(|r| {
                let area = r.area as f64;
                area >= self.config.min_area && area <= max_area
            })
            .filter(|r| r.bbox().is_inside(size.width, size.height, margin))
            .fold(None, |best: Option<&Region>, r| match best {
                Some(b) if b.area >= r.area => Some(b),
                _ => Some(r),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::scene;

    fn calibrated(config: ReferenceConfig) -> ReferenceDetector {
        let mut detector = ReferenceDetector::new(config);
        let frames: Vec<DynamicImage> = (0..4).map(|_| scene(100, None)).collect();
        detector.build_background(&frames).expect("calibration");
        detector
    }

    #[test]
    fn detects_centered_block() {
        let detector = calibrated(ReferenceConfig::default());
        let result = detector.detect(&scene(100, Some((45, 45, 10))), false);

        assert!(result.detected);
        assert!((44..=46).contains(&result.bbox.x), "bbox {:?}", result.bbox);
        assert!((44..=46).contains(&result.bbox.y), "bbox {:?}", result.bbox);
        assert!((8..=12).contains(&result.bbox.width), "bbox {:?}", result.bbox);
        assert!((8..=12).contains(&result.bbox.height), "bbox {:?}", result.bbox);
        assert!((result.centroid.x - 49.5).abs() <= 0.5);
        assert!((result.centroid.y - 49.5).abs() <= 0.5);
        assert!((80.0..=160.0).contains(&result.area), "area {}", result.area);
        assert!(result.mask.is_none());
    }

    #[test]
    fn rejects_block_touching_border() {
        let detector = calibrated(ReferenceConfig::default());
        let result = detector.detect(&scene(100, Some((0, 45, 10))), false);
        assert!(!result.detected);
    }

    #[test]
    fn rejects_block_below_min_area() {
        let detector = calibrated(ReferenceConfig {
            min_area: 500.0,
            ..ReferenceConfig::default()
        });
        assert!(!detector.detect(&scene(100, Some((45, 45, 10))), false).detected);
    }

    #[test]
    fn mask_is_attached_on_request() {
        let detector = calibrated(ReferenceConfig::default());
        let result = detector.detect(&scene(100, Some((45, 45, 10))), true);
        let mask = result.mask.expect("mask requested");
        assert_eq!(mask.dimensions(), (100, 100));
        assert_eq!(mask.get_pixel(49, 49).0[0], 255);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
    }

    #[test]
    fn flat_frame_collapses_to_empty_mask() {
        let detector = calibrated(ReferenceConfig::default());
        let result = detector.detect(&scene(100, None), true);
        assert!(!result.detected);
        let mask = result.mask.expect("mask requested");
        assert!(mask.iter().all(|&p| p == 0));
    }

    #[test]
    fn missing_background_is_not_ready() {
        let detector = ReferenceDetector::new(ReferenceConfig::default());
        assert!(!detector.is_ready());
        assert!(!detector.detect(&scene(100, Some((45, 45, 10))), false).detected);
    }

    #[test]
    fn size_mismatch_yields_no_detection() {
        let detector = calibrated(ReferenceConfig::default());
        let result = detector.detect(&scene(80, Some((35, 35, 10))), false);
        assert!(!result.detected);
    }

    #[test]
    fn local_policy_is_ready_without_calibration() {
        let mut detector = ReferenceDetector::new(ReferenceConfig {
            bg_mode: BackgroundPolicy::Local,
            ..ReferenceConfig::default()
        });
        assert!(detector.is_ready());
        detector.build_background(&[]).expect("local policy accepts no frames");
        assert!(!detector.has_background());
        assert!(!detector.detect(&scene(100, None), false).detected);
    }

    #[test]
    fn local_policy_segments_block_against_its_own_blur() {
        let detector = ReferenceDetector::new(ReferenceConfig {
            bg_mode: BackgroundPolicy::Local,
            sigma: 5.0,
            ..ReferenceConfig::default()
        });
        let result = detector.detect(&scene(100, Some((40, 40, 20))), false);

        assert!(result.detected);
        assert!((39..=41).contains(&result.bbox.x), "bbox {:?}", result.bbox);
        assert!((39..=41).contains(&result.bbox.y), "bbox {:?}", result.bbox);
        assert!((18..=22).contains(&result.bbox.width), "bbox {:?}", result.bbox);
        assert!((18..=22).contains(&result.bbox.height), "bbox {:?}", result.bbox);
        assert!((result.centroid.x - 49.5).abs() <= 0.5);
        assert!((result.centroid.y - 49.5).abs() <= 0.5);
        assert!((300.0..=450.0).contains(&result.area), "area {}", result.area);
    }

    #[test]
    fn failed_calibration_keeps_previous_model() {
        let mut detector = calibrated(ReferenceConfig::default());
        assert!(detector.build_background(&[]).is_err());
        assert!(detector.has_background());
    }

    #[test]
    fn out_of_range_parameters_are_clamped() {
        let detector = ReferenceDetector::new(ReferenceConfig {
            sigma: -2.0,
            morph_radius: 0,
            max_area_frac: 3.0,
            reset_frames_no_detection: -4,
            ..ReferenceConfig::default()
        });
        let cfg = detector.config();
        assert_eq!(cfg.sigma, DEFAULT_SIGMA);
        assert_eq!(cfg.morph_radius, 1);
        assert_eq!(cfg.max_area_frac, 1.0);
        assert_eq!(cfg.reset_frames_no_detection, 1);
    }
}
