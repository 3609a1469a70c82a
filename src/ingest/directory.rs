//! Directory frame source.
//!
//! Reads still images from a local directory, one frame per file, in file
//! name order. Supported formats are PNG and TIFF at 8 or 16 bits; decoding
//! happens in-memory and frames are handed off without being retained.

use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "tif", "tiff"];

pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
        }
    }

    /// Frame files found by `connect`, in playback order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            anyhow!(
                "failed to read frame directory {}: {}",
                self.dir.display(),
                e
            )
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!(
                "no PNG or TIFF frames in {}",
                self.dir.display()
            ));
        }
        log::info!(
            "DirectorySource: connected to {} ({} frames)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let frame = image::open(path)
            .map_err(|e| anyhow!("failed to decode frame {}: {}", path.display(), e))?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.cursor as u64,
            path: self.dir.display().to_string(),
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
