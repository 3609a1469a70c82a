use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;

use crate::background::BackgroundPolicy;
use crate::detect::{FastConfig, Pipeline, ReferenceConfig};

const DEFAULT_SOURCE: &str = "stub://synthetic";
const DEFAULT_CALIBRATION_FRAMES: usize = 20;

#[derive(Debug, Deserialize, Default)]
struct EventGateConfigFile {
    pipeline: Option<Pipeline>,
    reference: Option<ReferenceConfig>,
    fast: Option<FastConfig>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    calibration_frames: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventGateConfig {
    pub pipeline: Pipeline,
    pub reference: ReferenceConfig,
    pub fast: FastConfig,
    pub source: SourceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSettings {
    /// Directory of frames, or a `stub://` URL for the synthetic source.
    pub path: String,
    /// Leading frames consumed for calibration before detection starts.
    pub calibration_frames: usize,
}

impl Default for EventGateConfig {
    fn default() -> Self {
        Self {
            pipeline: Pipeline::default(),
            reference: ReferenceConfig::default(),
            fast: FastConfig::default(),
            source: SourceSettings {
                path: DEFAULT_SOURCE.to_string(),
                calibration_frames: DEFAULT_CALIBRATION_FRAMES,
            },
        }
    }
}

impl EventGateConfig {
    /// Defaults, then the file named by `EVENTGATE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("EVENTGATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EventGateConfigFile) -> Self {
        let source = SourceSettings {
            path: file
                .source
                .as_ref()
                .and_then(|source| source.path.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            calibration_frames: file
                .source
                .as_ref()
                .and_then(|source| source.calibration_frames)
                .unwrap_or(DEFAULT_CALIBRATION_FRAMES),
        };
        Self {
            pipeline: file.pipeline.unwrap_or_default(),
            reference: file.reference.unwrap_or_default(),
            fast: file.fast.unwrap_or_default(),
            source,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_value("EVENTGATE_PIPELINE") {
            self.pipeline = value
                .parse()
                .map_err(|e| anyhow!("EVENTGATE_PIPELINE: {}", e))?;
        }
        if let Some(value) = env_value("EVENTGATE_BG_MODE") {
            self.reference.bg_mode = value
                .parse::<BackgroundPolicy>()
                .map_err(|e| anyhow!("EVENTGATE_BG_MODE: {}", e))?;
        }
        if let Some(value) = env_value("EVENTGATE_SCALE") {
            self.fast.scale = value
                .parse()
                .map_err(|_| anyhow!("EVENTGATE_SCALE must be a number"))?;
        }
        if let Some(value) = env_value("EVENTGATE_DIFF_THRESH") {
            self.fast.diff_thresh = value
                .parse()
                .map_err(|_| anyhow!("EVENTGATE_DIFF_THRESH must be an integer"))?;
        }
        if let Some(value) = env_value("EVENTGATE_SOURCE") {
            self.source.path = value;
        }
        if let Some(value) = env_value("EVENTGATE_CALIBRATION_FRAMES") {
            self.source.calibration_frames = value
                .parse()
                .map_err(|_| anyhow!("EVENTGATE_CALIBRATION_FRAMES must be a frame count"))?;
        }
        Ok(())
    }

    /// Numeric ranges are left to the detectors, which clamp on construction.
    pub fn validate(&self) -> Result<()> {
        if self.source.path.trim().is_empty() {
            return Err(anyhow!("source path must not be empty"));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<EventGateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Clamp `value` into `[lo, hi]`, logging when it had to move.
/// NaN is treated as below range.
pub(crate) fn clamp_param<T>(name: &str, value: T, lo: T, hi: T) -> T
where
    T: PartialOrd + Copy + Display,
{
    if !(value >= lo) {
        warn_param(name, value, lo);
        lo
    } else if value > hi {
        warn_param(name, value, hi);
        hi
    } else {
        value
    }
}

pub(crate) fn warn_param<T: Display>(name: &str, value: T, replacement: T) {
    log::warn!(
        "parameter {} = {} out of range; using {}",
        name,
        value,
        replacement
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_param_bounds_values() {
        assert_eq!(clamp_param("a", 5, 1, 10), 5);
        assert_eq!(clamp_param("a", -5, 1, 10), 1);
        assert_eq!(clamp_param("a", 50, 1, 10), 10);
        assert_eq!(clamp_param("a", f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn partial_sections_take_defaults() {
        let file: EventGateConfigFile =
            serde_json::from_str(r#"{"fast": {"scale": 0.25}, "source": {"path": "/frames"}}"#)
                .expect("parse");
        let cfg = EventGateConfig::from_file(file);
        assert_eq!(cfg.fast.scale, 0.25);
        assert_eq!(cfg.fast.bg_frames, FastConfig::default().bg_frames);
        assert_eq!(cfg.reference, ReferenceConfig::default());
        assert_eq!(cfg.source.path, "/frames");
        assert_eq!(cfg.source.calibration_frames, DEFAULT_CALIBRATION_FRAMES);
    }
}
