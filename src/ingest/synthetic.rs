//! Synthetic frame source (`stub://`).
//!
//! Produces a uniform background with a bright square that periodically
//! crosses the field of view. Each period starts with `quiet_frames` empty
//! frames, so the leading frames of a stream are usable for calibration.
//!
//! Recognized query keys: `frames` (stop after N), `width`, `height`,
//! `depth` (8 or 16).

use anyhow::{anyhow, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

use super::{FrameSource, SourceStats};

pub(crate) const SCHEME: &str = "stub://";

const BACKGROUND: u8 = 20;
const OBJECT: u8 = 220;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// 8 or 16 bits per sample.
    pub depth: u8,
    /// Total frames before the source reports exhaustion; `None` runs forever.
    pub frames: Option<u64>,
    /// Side of the bright square.
    pub object_side: u32,
    pub quiet_frames: u64,
    pub visible_frames: u64,
    /// Horizontal displacement per visible frame.
    pub step: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://synthetic".to_string(),
            width: 320,
            height: 240,
            depth: 8,
            frames: None,
            object_side: 36,
            quiet_frames: 20,
            visible_frames: 10,
            step: 4,
        }
    }
}

impl SyntheticConfig {
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| anyhow!("not a stub url: {}", url))?;
        let mut cfg = Self {
            url: url.to_string(),
            ..Self::default()
        };
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(cfg);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
            let invalid = || anyhow!("invalid value '{}' for stub parameter {}", value, key);
            match key {
                "frames" => cfg.frames = Some(value.parse().map_err(|_| invalid())?),
                "width" => cfg.width = value.parse().map_err(|_| invalid())?,
                "height" => cfg.height = value.parse().map_err(|_| invalid())?,
                "depth" => {
                    cfg.depth = match value {
                        "8" => 8,
                        "16" => 16,
                        _ => return Err(invalid()),
                    }
                }
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if cfg.width <= cfg.object_side || cfg.height <= cfg.object_side {
            return Err(anyhow!(
                "stub frame {}x{} too small for a {}px object",
                cfg.width,
                cfg.height,
                cfg.object_side
            ));
        }
        Ok(cfg)
    }

    fn period(&self) -> u64 {
        self.quiet_frames + self.visible_frames
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    /// Top-left corner of the object in frame `index`, if it is in view.
    pub fn object_at(&self, index: u64) -> Option<(u32, u32)> {
        let cfg = &self.config;
        let phase = index % cfg.period().max(1);
        if phase < cfg.quiet_frames {
            return None;
        }
        let k = (phase - cfg.quiet_frames) as u32;
        let max_x = cfg.width.saturating_sub(cfg.object_side + 1);
        let x0 = (cfg.width / 5 + cfg.step * k).min(max_x);
        let y0 = cfg.height.saturating_sub(cfg.object_side) / 2;
        Some((x0, y0))
    }

    fn render(&self, index: u64) -> GrayImage {
        let side = self.config.object_side;
        let object = self.object_at(index);
        GrayImage::from_fn(self.config.width, self.config.height, |x, y| match object {
            Some((x0, y0)) if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) => {
                Luma([OBJECT])
            }
            _ => Luma([BACKGROUND]),
        })
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{}, {}-bit)",
            self.config.url,
            self.config.width,
            self.config.height,
            self.config.depth
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        if self.config.frames.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let gray = self.render(self.frame_count);
        self.frame_count += 1;

        let frame = if self.config.depth == 16 {
            let wide: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
                    Luma([u16::from(gray.get_pixel(x, y).0[0]) * 257])
                });
            DynamicImage::ImageLuma16(wide)
        } else {
            DynamicImage::ImageLuma8(gray)
        };
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            path: self.config.url.clone(),
        }
    }
}
