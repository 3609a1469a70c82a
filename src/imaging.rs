//! Raster primitives shared by the reference and fast detectors.
//!
//! Masks are `GrayImage`s holding 0 (background) or 255 (foreground).
//! Float images hold normalized intensity, nominally in [0, 1].

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::box_filter;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::detect::{BoundingBox, Centroid};
use crate::frame::FrameSize;

pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

const FOREGROUND: u8 = 255;

/// Convert an 8-bit image to float intensity in [0, 1].
pub fn to_unit_float(image: &GrayImage) -> FloatImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(image.get_pixel(x, y).0[0]) / 255.0])
    })
}

/// Per-pixel `|a - b|`. Both images must share dimensions.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = a.clone();
    for (o, &v) in out.iter_mut().zip(b.iter()) {
        *o = o.abs_diff(v);
    }
    out
}

/// Binary mask of pixels strictly brighter than `level`.
pub fn threshold_above(image: &GrayImage, level: u8) -> GrayImage {
    let mut mask = image.clone();
    for p in mask.iter_mut() {
        *p = if *p > level { FOREGROUND } else { 0 };
    }
    mask
}

/// Binarize with an automatically selected global (Otsu) threshold.
pub fn otsu_mask(image: &GrayImage) -> GrayImage {
    threshold_above(image, otsu_level(image))
}

/// Morphological open followed by close, using a disk of the given radius.
pub fn open_close(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let opened = open(mask, Norm::L2, radius);
    close(&opened, Norm::L2, radius)
}

/// Box (mean) blur over a `(2r+1)` square window.
pub fn box_blur(image: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }
    box_filter(image, radius, radius)
}

pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.iter().filter(|&&p| p != 0).count() as u64
}

/// Size of an image after downscaling by `scale`, never below 1x1.
pub fn scaled_size(size: FrameSize, scale: f64) -> FrameSize {
    let dim = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    FrameSize::new(dim(size.width), dim(size.height))
}

/// Downscale by `scale` in (0, 1]. Borrows the input when no resampling is needed.
pub fn downscale(image: &GrayImage, scale: f64) -> Cow<'_, GrayImage> {
    if scale >= 1.0 {
        return Cow::Borrowed(image);
    }
    let target = scaled_size(FrameSize::of(image), scale);
    Cow::Owned(imageops::resize(
        image,
        target.width,
        target.height,
        FilterType::Triangle,
    ))
}

/// Percentile contrast range of `values`.
///
/// With `clip` in (0, 0.5) the low/high percentiles at `clip` and `1 - clip`
/// are returned; otherwise (or if the percentiles collapse) the plain min/max.
/// `None` when the range is empty.
pub fn clip_range(values: &[f32], clip: f64) -> Option<(f32, f32)> {
    if values.is_empty() {
        return None;
    }
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let plain = (max > min).then_some((min, max));
    if !(clip > 0.0 && clip < 0.5) {
        return plain;
    }

    let last = (values.len() - 1) as f64;
    let low_idx = (clip * last) as usize;
    let high_idx = ((1.0 - clip) * last) as usize;
    if low_idx >= high_idx {
        return plain;
    }

    let mut scratch = values.to_vec();
    let low = *scratch.select_nth_unstable_by(low_idx, f32::total_cmp).1;
    let high = *scratch.select_nth_unstable_by(high_idx, f32::total_cmp).1;
    if high <= low {
        return plain;
    }
    Some((low, high))
}

/// Linearly stretch `[low, high]` of a float image onto [0, 255], clamping outliers.
///
/// `None` when the contrast range collapses.
pub fn stretch_to_u8(image: &FloatImage, clip: f64) -> Option<GrayImage> {
    let (low, high) = clip_range(image.as_raw(), clip)?;
    let span = high - low;
    Some(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = (image.get_pixel(x, y).0[0] - low) / span;
        Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
    }))
}

/// Fill background pockets that do not reach the image border.
///
/// After filling, every 8-connected foreground region covers the full area
/// enclosed by its outer boundary.
pub fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }
    // Label the background (4-connected) instead of the foreground.
    let gaps = connected_components(mask, Connectivity::Four, Luma([FOREGROUND]));
    let max_label = gaps.iter().copied().max().unwrap_or(0) as usize;
    let mut touches_border = vec![false; max_label + 1];
    for x in 0..width {
        touches_border[gaps.get_pixel(x, 0).0[0] as usize] = true;
        touches_border[gaps.get_pixel(x, height - 1).0[0] as usize] = true;
    }
    for y in 0..height {
        touches_border[gaps.get_pixel(0, y).0[0] as usize] = true;
        touches_border[gaps.get_pixel(width - 1, y).0[0] as usize] = true;
    }

    let mut filled = mask.clone();
    for (x, y, p) in filled.enumerate_pixels_mut() {
        let label = gaps.get_pixel(x, y).0[0];
        if label != 0 && !touches_border[label as usize] {
            p.0[0] = FOREGROUND;
        }
    }
    filled
}

/// Statistics of one 8-connected foreground region.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub label: u32,
    pub area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: f64,
    sum_y: f64,
}

impl Region {
    fn seed(label: u32, x: u32, y: u32) -> Self {
        Self {
            label,
            area: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: 0.0,
            sum_y: 0.0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += f64::from(x);
        self.sum_y += f64::from(y);
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }

    /// First-order moments over zeroth-order moment of the region.
    pub fn centroid(&self) -> Centroid {
        if self.area == 0 {
            return Centroid::default();
        }
        let n = self.area as f64;
        Centroid::new((self.sum_x / n) as f32, (self.sum_y / n) as f32)
    }
}

/// Labelled foreground regions of a binary mask.
pub struct Regions {
    labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    regions: Vec<Region>,
}

impl Regions {
    /// Label 8-connected foreground regions and collect their statistics.
    pub fn label(mask: &GrayImage) -> Self {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        let mut slots: Vec<Option<Region>> = Vec::new();
        for (x, y, p) in labels.enumerate_pixels() {
            let label = p.0[0];
            if label == 0 {
                continue;
            }
            let idx = label as usize;
            if idx >= slots.len() {
                slots.resize(idx + 1, None);
            }
            slots[idx]
                .get_or_insert_with(|| Region::seed(label, x, y))
                .add(x, y);
        }
        Self {
            labels,
            regions: slots.into_iter().flatten().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Keep only regions matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&Region) -> bool) {
        self.regions.retain(keep);
    }

    /// Render the retained regions as a binary mask.
    pub fn to_mask(&self) -> GrayImage {
        let max_label = self.regions.iter().map(|r| r.label).max().unwrap_or(0) as usize;
        let mut kept = vec![false; max_label + 1];
        for region in &self.regions {
            kept[region.label as usize] = true;
        }
        GrayImage::from_fn(self.labels.width(), self.labels.height(), |x, y| {
            let label = self.labels.get_pixel(x, y).0[0] as usize;
            if label != 0 && label <= max_label && kept[label] {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        })
    }
}
