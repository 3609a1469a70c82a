//! Host loop: calibrate from the head of a stream, then route every frame's
//! outcome to the sinks until the source ends or a stop is requested.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::detect::EventDetector;
use crate::ingest::FrameSource;
use crate::sink::{ClassificationSink, TriggerSink};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub calibration_frames: usize,
    pub frames: u64,
    pub detections: u64,
    pub fires: u64,
}

/// Calibrate `detector` from the next `count` frames of `source`.
///
/// Returns the number of frames consumed. With `count == 0` no calibration
/// call is made; the fast path then acquires its background from the stream.
pub fn calibrate(
    source: &mut dyn FrameSource,
    detector: &mut dyn EventDetector,
    count: usize,
) -> Result<usize> {
    if count == 0 {
        if !detector.is_ready() {
            log::warn!(
                "{} detector: no calibration frames configured; not ready yet",
                detector.name()
            );
        }
        return Ok(0);
    }

    let mut frames = Vec::with_capacity(count);
    while frames.len() < count {
        match source.next_frame()? {
            Some(frame) => frames.push(frame),
            None => break,
        }
    }
    if frames.is_empty() {
        return Err(anyhow!("source ended before any calibration frame"));
    }
    if frames.len() < count {
        log::warn!(
            "source ended after {} of {} calibration frames",
            frames.len(),
            count
        );
    }
    detector.calibrate(&frames)?;
    log::info!(
        "{} detector calibrated from {} frames (ready={})",
        detector.name(),
        frames.len(),
        detector.is_ready()
    );
    Ok(frames.len())
}

/// Process frames until the source is exhausted or `stop` is set.
///
/// Trigger sink failures abort the run; classification failures are logged
/// and the stream continues. The trigger sink is finished before returning.
pub fn run(
    source: &mut dyn FrameSource,
    detector: &mut dyn EventDetector,
    trigger: &mut dyn TriggerSink,
    mut classifier: Option<&mut dyn ClassificationSink>,
    first_index: u64,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut index = first_index;
    let mut last_health_log = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let outcome = detector.process_frame(&frame);
        summary.frames += 1;
        if outcome.detected() {
            summary.detections += 1;
        }
        trigger.on_outcome(index, &outcome)?;

        if outcome.fired {
            summary.fires += 1;
            if let Some(classifier) = classifier.as_deref_mut() {
                if let Err(e) = classifier.on_fire(index, &frame, &outcome.result) {
                    log::error!("classification sink failed at frame {}: {}", index, e);
                }
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source={} frames={} detections={} fires={} ready={}",
                stats.path,
                stats.frames_captured,
                summary.detections,
                summary.fires,
                detector.is_ready()
            );
            last_health_log = Instant::now();
        }
        index += 1;
    }
    trigger.finish()?;
    Ok(summary)
}
