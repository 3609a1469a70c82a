//! Frame normalization.
//!
//! Frames arrive from the camera at whatever depth the sensor was configured
//! for (8-bit or 16-bit mono, occasionally colour from a test file). Both
//! detectors work on an 8-bit grayscale representation, produced here.
//!
//! - 8-bit mono frames are borrowed as-is, no copy.
//! - Any other layout is linearly rescaled to 8-bit (`DynamicImage::to_luma8`).
//! - Zero-sized frames normalize to `None`; callers treat that as "no detection".

use std::borrow::Cow;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Width and height of a frame, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &GrayImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shorter of the two dimensions.
    pub fn min_dim(&self) -> u32 {
        self.width.min(self.height)
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Normalize a frame to the 8-bit working representation.
///
/// Returns `None` for an empty frame. The result borrows the input when it is
/// already 8-bit grayscale.
pub fn to_gray8(frame: &DynamicImage) -> Option<Cow<'_, GrayImage>> {
    if frame.width() == 0 || frame.height() == 0 {
        return None;
    }
    match frame {
        DynamicImage::ImageLuma8(gray) => Some(Cow::Borrowed(gray)),
        other => Some(Cow::Owned(other.to_luma8())),
    }
}
