//! eventd - event detection daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by EVENTGATE_CONFIG, then env overrides)
//! 2. Opens the frame source (image directory or stub://)
//! 3. Calibrates the selected detector from the head of the stream
//! 4. Runs detection per frame, logging fires and writing sink output
//! 5. Stops on source exhaustion or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use event_gate::{
    build_detector, open_source, ClassificationSink, CropSink, EventGateConfig, JsonLinesSink,
    LogTrigger, Pipeline, TriggerSink,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: image directory or stub:// URL (overrides config).
    #[arg(long)]
    source: Option<String>,
    /// Detection path (overrides config).
    #[arg(long)]
    pipeline: Option<Pipeline>,
    /// Frames consumed for calibration (overrides config).
    #[arg(long)]
    calibration_frames: Option<usize>,
    /// Write one JSON line per processed frame to this file.
    #[arg(long, env = "EVENTGATE_EVENTS_OUT")]
    events_out: Option<PathBuf>,
    /// Write the crop of every fired frame into this directory.
    #[arg(long, env = "EVENTGATE_CROPS_DIR")]
    crops_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = EventGateConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.path = source;
    }
    if let Some(pipeline) = args.pipeline {
        cfg.pipeline = pipeline;
    }
    if let Some(count) = args.calibration_frames {
        cfg.source.calibration_frames = count;
    }
    cfg.validate()?;

    let mut source = open_source(&cfg.source.path)?;
    source.connect()?;
    let mut detector = build_detector(cfg.pipeline, &cfg.reference, &cfg.fast);

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let calibrated = event_gate::calibrate(
        source.as_mut(),
        detector.as_mut(),
        cfg.source.calibration_frames,
    )?;

    let mut triggers: Vec<Box<dyn TriggerSink>> = vec![Box::new(LogTrigger::new())];
    if let Some(path) = &args.events_out {
        triggers.push(Box::new(JsonLinesSink::create(path)?));
        log::info!("frame records written to {}", path.display());
    }
    let mut crops = match &args.crops_dir {
        Some(dir) => Some(CropSink::new(dir)?),
        None => None,
    };

    log::info!(
        "eventd running: pipeline={} source={}",
        cfg.pipeline,
        cfg.source.path
    );
    let summary = event_gate::run(
        source.as_mut(),
        detector.as_mut(),
        &mut triggers,
        crops.as_mut().map(|c| c as &mut dyn ClassificationSink),
        calibrated as u64,
        &stop,
    )?;

    if stop.load(Ordering::Relaxed) {
        log::info!("shutdown signal received");
    }
    log::info!(
        "eventd finished: calibration_frames={} frames={} detections={} fires={}",
        calibrated,
        summary.frames,
        summary.detections,
        summary.fires
    );
    Ok(())
}
