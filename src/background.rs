//! Background model construction from calibration frames.
//!
//! The reference detector differences every frame against a static model
//! aggregated here. Policies:
//!
//! - `mean`: per-pixel arithmetic average.
//! - `median`: per-pixel median, degrading to `mean` past an element ceiling.
//! - `max` / `min`: per-pixel extreme.
//! - `local` (alias `self`): no stored model; detection high-passes each
//!   frame against a blur of itself instead.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::frame::{to_gray8, FrameSize};
use crate::imaging::FloatImage;

/// Default ceiling on `frames × pixels` for the median policy.
pub const DEFAULT_MEDIAN_MAX_ELEMENTS: u64 = 40_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BackgroundPolicy {
    #[default]
    Mean,
    Median,
    Max,
    Min,
    Local,
}

impl BackgroundPolicy {
    /// True when the policy keeps no stored model.
    pub fn is_local(self) -> bool {
        matches!(self, BackgroundPolicy::Local)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackgroundPolicy::Mean => "mean",
            BackgroundPolicy::Median => "median",
            BackgroundPolicy::Max => "max",
            BackgroundPolicy::Min => "min",
            BackgroundPolicy::Local => "local",
        }
    }
}

impl fmt::Display for BackgroundPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(BackgroundPolicy::Mean),
            "median" => Ok(BackgroundPolicy::Median),
            "max" => Ok(BackgroundPolicy::Max),
            "min" => Ok(BackgroundPolicy::Min),
            "local" | "self" => Ok(BackgroundPolicy::Local),
            other => Err(format!(
                "unknown background policy '{}' (expected mean, median, max, min or local)",
                other
            )),
        }
    }
}

impl TryFrom<String> for BackgroundPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Static reference image, normalized float intensity in [0, 1].
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    image: FloatImage,
    policy: BackgroundPolicy,
    frames_used: usize,
}

impl BackgroundModel {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &FloatImage {
        &self.image
    }

    /// Policy actually applied (median may have degraded to mean).
    pub fn policy(&self) -> BackgroundPolicy {
        self.policy
    }

    pub fn frames_used(&self) -> usize {
        self.frames_used
    }

    fn from_gray(image: &GrayImage, policy: BackgroundPolicy, frames_used: usize) -> Self {
        Self {
            image: crate::imaging::to_unit_float(image),
            policy,
            frames_used,
        }
    }
}

/// Aggregate calibration frames into a background model.
///
/// Returns `Ok(None)` under the local policy. Frames that are empty, or whose
/// size differs from the first non-empty frame, are skipped.
pub fn build_background(
    frames: &[DynamicImage],
    policy: BackgroundPolicy,
    median_max_elements: u64,
) -> Result<Option<BackgroundModel>, CalibrationError> {
    if policy.is_local() {
        return Ok(None);
    }
    if frames.is_empty() {
        return Err(CalibrationError::NoFrames);
    }

    let mut valid: Vec<std::borrow::Cow<'_, GrayImage>> = Vec::with_capacity(frames.len());
    let mut size: Option<FrameSize> = None;
    for frame in frames {
        let Some(gray) = to_gray8(frame) else {
            continue;
        };
        let frame_size = FrameSize::of(&gray);
        match size {
            None => size = Some(frame_size),
            Some(expected) if expected != frame_size => {
                log::debug!(
                    "skipping calibration frame of size {} (expected {})",
                    frame_size,
                    expected
                );
                continue;
            }
            Some(_) => {}
        }
        valid.push(gray);
    }
    let Some(size) = size else {
        return Err(CalibrationError::NoUsableFrames {
            supplied: frames.len(),
        });
    };
    let grays: Vec<&GrayImage> = valid.iter().map(|g| g.as_ref()).collect();

    let model = match policy {
        BackgroundPolicy::Max => {
            BackgroundModel::from_gray(&extreme(&grays, u8::max), policy, grays.len())
        }
        BackgroundPolicy::Min => {
            BackgroundModel::from_gray(&extreme(&grays, u8::min), policy, grays.len())
        }
        BackgroundPolicy::Median => {
            let elements = grays.len() as u64 * size.area();
            if elements > median_max_elements {
                log::warn!(
                    "median background needs {} elements (ceiling {}); using mean",
                    elements,
                    median_max_elements
                );
                mean(&grays, size)
            } else {
                BackgroundModel::from_gray(&median(&grays, size), policy, grays.len())
            }
        }
        BackgroundPolicy::Mean | BackgroundPolicy::Local => mean(&grays, size),
    };

    log::info!(
        "background built: policy={}, frames={}/{}, size={}",
        model.policy(),
        model.frames_used(),
        frames.len(),
        size
    );
    Ok(Some(model))
}

fn extreme(frames: &[&GrayImage], pick: fn(u8, u8) -> u8) -> GrayImage {
    let mut agg = frames[0].clone();
    for frame in &frames[1..] {
        for (a, &v) in agg.iter_mut().zip(frame.iter()) {
            *a = pick(*a, v);
        }
    }
    agg
}

fn median(frames: &[&GrayImage], size: FrameSize) -> GrayImage {
    let mid = frames.len() / 2;
    let mut column = vec![0u8; frames.len()];
    let mut out = GrayImage::new(size.width, size.height);
    for (i, px) in out.iter_mut().enumerate() {
        for (slot, frame) in column.iter_mut().zip(frames) {
            *slot = frame.as_raw()[i];
        }
        *px = *column.select_nth_unstable(mid).1;
    }
    out
}

fn mean(frames: &[&GrayImage], size: FrameSize) -> BackgroundModel {
    let mut sum = vec![0u32; size.area() as usize];
    for frame in frames {
        for (s, &v) in sum.iter_mut().zip(frame.iter()) {
            *s += u32::from(v);
        }
    }
    let n = frames.len() as f32;
    let image: FloatImage = ImageBuffer::from_fn(size.width, size.height, |x, y| {
        let idx = (y * size.width + x) as usize;
        Luma([sum[idx] as f32 / n / 255.0])
    });
    BackgroundModel {
        image,
        policy: BackgroundPolicy::Mean,
        frames_used: frames.len(),
    }
}
