//! Consumers of per-frame detector output.
//!
//! The trigger sink sees every frame's outcome and is on the timing-critical
//! path; the classification sink only sees fired frames, together with the
//! frame itself, and may be slow.

use anyhow::{anyhow, Result};
use image::DynamicImage;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::detect::{BoundingBox, Centroid, DetectionResult, FrameOutcome};

/// Receives every processed frame's outcome.
pub trait TriggerSink {
    fn on_outcome(&mut self, frame_index: u64, outcome: &FrameOutcome) -> Result<()>;

    /// Called once after the last frame; buffered output must be written here.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives fired frames for downstream classification.
pub trait ClassificationSink {
    fn on_fire(
        &mut self,
        frame_index: u64,
        frame: &DynamicImage,
        result: &DetectionResult,
    ) -> Result<()>;
}

impl TriggerSink for Vec<Box<dyn TriggerSink>> {
    fn on_outcome(&mut self, frame_index: u64, outcome: &FrameOutcome) -> Result<()> {
        for sink in self.iter_mut() {
            sink.on_outcome(frame_index, outcome)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for sink in self.iter_mut() {
            sink.finish()?;
        }
        Ok(())
    }
}

/// Logs each fire at `info`.
#[derive(Debug, Default)]
pub struct LogTrigger {
    fires: u64,
}

impl LogTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fires(&self) -> u64 {
        self.fires
    }
}

impl TriggerSink for LogTrigger {
    fn on_outcome(&mut self, frame_index: u64, outcome: &FrameOutcome) -> Result<()> {
        if outcome.fired {
            self.fires += 1;
            let r = &outcome.result;
            log::info!(
                "fire #{} at frame {}: area={:.1} bbox=({}, {}, {}x{}) centroid=({:.1}, {:.1})",
                self.fires,
                frame_index,
                r.area,
                r.bbox.x,
                r.bbox.y,
                r.bbox.width,
                r.bbox.height,
                r.centroid.x,
                r.centroid.y
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    frame_index: u64,
    detected: bool,
    fired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    centroid: Option<Centroid>,
}

impl FrameRecord {
    fn new(frame_index: u64, outcome: &FrameOutcome) -> Self {
        let r = &outcome.result;
        let detected = r.detected;
        Self {
            frame_index,
            detected,
            fired: outcome.fired,
            area: detected.then_some(r.area),
            bbox: detected.then_some(r.bbox),
            centroid: detected.then_some(r.centroid),
        }
    }
}

/// Writes one JSON object per processed frame, newline-delimited.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow!("failed to create event log {}: {}", path.display(), e))?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

impl<W: Write> TriggerSink for JsonLinesSink<W> {
    fn on_outcome(&mut self, frame_index: u64, outcome: &FrameOutcome) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &FrameRecord::new(frame_index, outcome))?;
        self.writer.write_all(b"\n")?;
        if outcome.fired {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the bounding-box crop of every fired frame as a PNG.
pub struct CropSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CropSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("failed to create crop directory {}: {}", dir.display(), e))?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ClassificationSink for CropSink {
    fn on_fire(
        &mut self,
        frame_index: u64,
        frame: &DynamicImage,
        result: &DetectionResult,
    ) -> Result<()> {
        let Some(bbox) = clip_to_frame(result.bbox, frame.width(), frame.height()) else {
            log::warn!("frame {}: fired with an empty crop; skipped", frame_index);
            return Ok(());
        };
        let crop = frame.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
        let path = self.dir.join(format!("event_{:06}.png", frame_index));
        crop.save(&path)
            .map_err(|e| anyhow!("failed to write crop {}: {}", path.display(), e))?;
        log::debug!("crop written to {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

fn clip_to_frame(bbox: BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    if bbox.x >= width || bbox.y >= height {
        return None;
    }
    let w = bbox.width.min(width - bbox.x);
    let h = bbox.height.min(height - bbox.y);
    (w > 0 && h > 0).then(|| BoundingBox::new(bbox.x, bbox.y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn fired_outcome() -> FrameOutcome {
        FrameOutcome {
            result: DetectionResult {
                detected: true,
                area: 100.0,
                bbox: BoundingBox::new(2, 3, 4, 5),
                centroid: Centroid::new(3.5, 5.0),
                mask: None,
            },
            fired: true,
        }
    }

    #[test]
    fn json_lines_records_every_frame() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.on_outcome(0, &FrameOutcome::default()).unwrap();
        sink.on_outcome(1, &fired_outcome()).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["detected"], false);
        assert!(lines[0].get("bbox").is_none());
        assert_eq!(lines[1]["fired"], true);
        assert_eq!(lines[1]["bbox"]["width"], 4);
        assert_eq!(lines[1]["centroid"]["x"], 3.5);
    }

    #[test]
    fn json_lines_finish_flushes_trailing_records() {
        let buffered = std::io::BufWriter::with_capacity(1 << 16, Vec::new());
        let mut sink = JsonLinesSink::new(buffered);
        sink.on_outcome(0, &FrameOutcome::default()).unwrap();
        assert!(sink.writer.get_ref().is_empty());

        sink.finish().unwrap();
        let text = String::from_utf8(sink.writer.get_ref().clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn log_trigger_counts_fires_only() {
        let mut sink = LogTrigger::new();
        sink.on_outcome(0, &FrameOutcome::default()).unwrap();
        sink.on_outcome(1, &fired_outcome()).unwrap();
        assert_eq!(sink.fires(), 1);
    }

    #[test]
    fn crop_sink_writes_bbox_png() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut sink = CropSink::new(dir.path().join("crops")).unwrap();
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([9])));
        sink.on_fire(7, &frame, &fired_outcome().result).unwrap();

        assert_eq!(sink.written().len(), 1);
        let crop = image::open(&sink.written()[0]).unwrap();
        assert_eq!((crop.width(), crop.height()), (4, 5));
        assert!(sink.written()[0].ends_with("event_000007.png"));
    }

    #[test]
    fn crop_is_clipped_to_frame() {
        let clipped = clip_to_frame(BoundingBox::new(8, 8, 10, 10), 12, 10).unwrap();
        assert_eq!(clipped, BoundingBox::new(8, 8, 4, 2));
        assert!(clip_to_frame(BoundingBox::new(12, 0, 3, 3), 12, 10).is_none());
    }
}
