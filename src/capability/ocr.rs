use std::process::Command;
use std::time::Duration;

use image::RgbImage;

use crate::capability::{run_with_deadline, BridgeError, TextRecognizer};
use crate::core::error::{PipelineError, Result};

/// Text recognizer shelling out to the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    lang: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(lang: impl Into<String>, timeout: Duration) -> Self {
        Self {
            lang: lang.into(),
            timeout,
        }
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image: &RgbImage) -> Result<String> {
        let tmp = tempfile::Builder::new()
            .prefix("papermine-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save(tmp.path())
            .map_err(|e| PipelineError::Extraction {
                message: format!("failed to stage image for OCR: {e}"),
            })?;

        let mut cmd = Command::new("tesseract");
        cmd.arg(tmp.path()).arg("stdout").arg("-l").arg(&self.lang);

        let output = run_with_deadline(cmd, None, self.timeout).map_err(|e| match e {
            BridgeError::Timeout { seconds } => PipelineError::Timeout {
                stage: "ocr",
                seconds,
            },
            BridgeError::Failed(message) => PipelineError::Extraction {
                message: format!("tesseract failed: {message}"),
            },
        })?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
