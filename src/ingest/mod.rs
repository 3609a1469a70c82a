//! Frame ingestion sources.
//!
//! This module provides sources for raw frames:
//! - Directories of still images, one frame per file (PNG or TIFF, 8/16-bit)
//! - Synthetic source (`stub://`, demos and tests)
//!
//! Camera acquisition and buffering live outside this crate; a camera driver
//! plugs in by implementing [`FrameSource`].
//!
//! The ingestion layer MUST NOT:
//! - Fetch remote URLs
//! - Log raw frame content

pub mod directory;
pub mod synthetic;

use anyhow::{anyhow, Result};
use image::DynamicImage;

pub use directory::DirectorySource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Producer of frames for one calibration + detection session.
pub trait FrameSource: Send {
    /// Prepare the source. Called once before the first frame.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub path: String,
}

/// Open the source named by `path`: `stub://...` or a local directory.
pub fn open_source(path: &str) -> Result<Box<dyn FrameSource>> {
    if !is_local_path(path) {
        return Err(anyhow!(
            "frame ingestion only supports local paths and stub:// (got {})",
            path
        ));
    }
    if path.starts_with(synthetic::SCHEME) {
        Ok(Box::new(SyntheticSource::new(SyntheticConfig::from_url(
            path,
        )?)))
    } else {
        Ok(Box::new(DirectorySource::new(path)))
    }
}

fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(synthetic::SCHEME) {
        return true;
    }
    !path.contains("://")
}
