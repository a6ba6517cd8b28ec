use std::process::Command;
use std::time::Duration;

use image::RgbImage;
use serde::Deserialize;
use tracing::debug;

use crate::capability::{run_with_deadline, BridgeError, Detection, RegionDetector};
use crate::core::error::{PipelineError, Result};
use crate::core::geometry::RawBox;

/// Region detector backed by a bridge process wrapping the detection model.
///
/// The bridge receives `--image <png>` and prints a JSON array of
/// `{"bbox": [x0, y0, x1, y1], "label": "figure", "confidence": 0.9}`
/// records on stdout.
#[derive(Debug, Clone)]
pub struct DetectorBridge {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    bbox: [i32; 4],
    label: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

impl DetectorBridge {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }
}

impl RegionDetector for DetectorBridge {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let tmp = tempfile::Builder::new()
            .prefix("papermine-page-")
            .suffix(".png")
            .tempfile()?;
        image
            .save(tmp.path())
            .map_err(|e| PipelineError::Detection {
                message: format!("failed to stage page image: {e}"),
            })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("--image").arg(tmp.path());

        let output = run_with_deadline(cmd, None, self.timeout).map_err(|e| match e {
            BridgeError::Timeout { seconds } => PipelineError::Timeout {
                stage: "detect",
                seconds,
            },
            BridgeError::Failed(message) => PipelineError::Detection { message },
        })?;

        let raw: Vec<RawDetection> =
            serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::Detection {
                message: format!("invalid detection JSON: {e}"),
            })?;

        debug!(regions = raw.len(), "detector bridge returned");

        Ok(raw
            .into_iter()
            .map(|d| Detection {
                bbox: RawBox::new(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
                label: d.label,
                confidence: d.confidence,
            })
            .collect())
    }
}
