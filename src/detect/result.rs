use image::GrayImage;
use serde::Serialize;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the box clears every frame edge by more than `margin` pixels.
    pub fn is_inside(&self, frame_width: u32, frame_height: u32, margin: u32) -> bool {
        let margin = i64::from(margin);
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        x > margin
            && y > margin
            && x + i64::from(self.width) < i64::from(frame_width) - margin
            && y + i64::from(self.height) < i64::from(frame_height) - margin
    }

    /// Multiply every coordinate by `factor`, rounding to the nearest pixel.
    pub fn scaled(&self, factor: f64) -> Self {
        let s = |v: u32| (f64::from(v) * factor).round() as u32;
        Self::new(s(self.x), s(self.y), s(self.width), s(self.height))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Centroid {
    pub x: f32,
    pub y: f32,
}

impl Centroid {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Centroid) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Result of running one detector over one frame.
///
/// Produced fresh on every call. `Default` is "nothing detected".
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    pub detected: bool,
    /// Candidate area in full-resolution pixels.
    pub area: f64,
    pub bbox: BoundingBox,
    pub centroid: Centroid,
    /// Foreground mask, when requested and available.
    pub mask: Option<GrayImage>,
}

impl DetectionResult {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Per-frame output of a gated detector.
#[derive(Clone, Debug, Default)]
pub struct FrameOutcome {
    pub result: DetectionResult,
    /// True only on the first frame of a new episode.
    pub fired: bool,
}

impl FrameOutcome {
    pub fn detected(&self) -> bool {
        self.result.detected
    }
}
