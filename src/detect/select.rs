use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detect::backend::EventDetector;
use crate::detect::backends::{FastConfig, FastDetector, Gate, ReferenceConfig};

/// Which detection path the host runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Pipeline {
    /// Adaptive segmentation behind the hysteresis gate.
    #[default]
    Reference,
    /// Fixed threshold on a downscaled frame with rolling background.
    Fast,
}

impl Pipeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Pipeline::Reference => "reference",
            Pipeline::Fast => "fast",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pipeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Pipeline::Reference),
            "fast" => Ok(Pipeline::Fast),
            other => Err(format!(
                "unknown pipeline '{}' (expected reference or fast)",
                other
            )),
        }
    }
}

impl TryFrom<String> for Pipeline {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Construct the detector for `pipeline`. The other path's parameters are ignored.
pub fn build_detector(
    pipeline: Pipeline,
    reference: &ReferenceConfig,
    fast: &FastConfig,
) -> Box<dyn EventDetector> {
    log::info!("detector pipeline: {}", pipeline);
    match pipeline {
        Pipeline::Reference => Box::new(Gate::new(reference.clone())),
        Pipeline::Fast => Box::new(FastDetector::new(fast.clone())),
    }
}
