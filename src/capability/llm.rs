use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::capability::{run_with_deadline, BridgeError, LanguageModel, VisionModel};
use crate::core::error::{PipelineError, Result};

/// Model capability backed by a bridge process: the prompt goes to the
/// child's stdin, the completion comes back on stdout. Image attachments are
/// passed as repeated `--image <path>` arguments.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandModel {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    fn run(&self, stage: &'static str, images: &[PathBuf], prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for image in images {
            cmd.arg("--image").arg(image);
        }

        debug!(stage, prompt_bytes = prompt.len(), images = images.len(), "model bridge call");

        let output = run_with_deadline(cmd, Some(prompt.as_bytes().to_vec()), self.timeout)
            .map_err(|e| match e {
                BridgeError::Timeout { seconds } => PipelineError::Timeout { stage, seconds },
                BridgeError::Failed(message) => PipelineError::ModelCall { stage, message },
            })?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl LanguageModel for CommandModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.run("language-model", &[], prompt)
    }
}

impl VisionModel for CommandModel {
    fn describe(&self, images: &[PathBuf], prompt: &str) -> Result<String> {
        self.run("vision-model", images, prompt)
    }
}
