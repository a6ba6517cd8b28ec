//! Interfaces to the external capabilities the pipeline depends on:
//! region detection, text recognition (OCR), and language/vision models.
//! Each is an opaque function behind a trait; production implementations
//! shell out to bridge processes, tests substitute deterministic mocks.

pub mod detector;
pub mod llm;
pub mod ocr;

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::core::error::Result;
use crate::core::geometry::RawBox;

/// One region proposed by the detection model.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: RawBox,
    pub label: String,
    pub confidence: f32,
}

/// Region-detection capability: `image -> [(bbox, label, confidence)]`.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;
}

/// Text-recognition capability: `image -> text`.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String>;
}

/// Language-model capability: `prompt -> text`. May fail; never retried here.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Vision-model capability: `(images, prompt) -> text`.
pub trait VisionModel: Send + Sync {
    fn describe(&self, images: &[PathBuf], prompt: &str) -> Result<String>;
}

pub(crate) struct BridgeOutput {
    pub stdout: Vec<u8>,
    #[allow(dead_code)]
    pub stderr: Vec<u8>,
}

pub(crate) enum BridgeError {
    Timeout { seconds: u64 },
    Failed(String),
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run a bridge process with a hard deadline. On expiry the child is killed
/// and a timeout is reported; a bridge call can fail but never hang.
pub(crate) fn run_with_deadline(
    mut cmd: Command,
    stdin_data: Option<Vec<u8>>,
    timeout: Duration,
) -> std::result::Result<BridgeOutput, BridgeError> {
    cmd.stdin(if stdin_data.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| BridgeError::Failed(format!("failed to spawn bridge: {e}")))?;

    // Pump stdin and both output pipes on their own threads so a chatty
    // child cannot deadlock against a full pipe buffer.
    let writer = stdin_data.and_then(|data| {
        child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                let _ = stdin.write_all(&data);
            })
        })
    });
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = std::io::Read::read_to_end(&mut out, &mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = std::io::Read::read_to_end(&mut err, &mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    if let Some(handle) = writer {
                        let _ = handle.join();
                    }
                    return Err(BridgeError::Timeout {
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(BridgeError::Failed(format!("failed to wait on bridge: {e}")));
            }
        }
    };

    if let Some(handle) = writer {
        let _ = handle.join();
    }
    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(BridgeError::Failed(format!(
            "bridge exited with {status}: {}",
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    Ok(BridgeOutput { stdout, stderr })
}

/// Split a `--*-cmd` string like `"python3 detect.py --weights w.onnx"` into
/// program and arguments.
pub fn parse_command(spec: &str) -> Option<(String, Vec<String>)> {
    let mut parts = spec.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_spec() {
        let (program, args) = parse_command("python3 detect.py --weights w.onnx").unwrap();
        assert_eq!(program, "python3");
        assert_eq!(args, vec!["detect.py", "--weights", "w.onnx"]);
        assert!(parse_command("   ").is_none());
    }

    #[test]
    fn reports_bridge_failure_with_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        match run_with_deadline(cmd, None, Duration::from_secs(5)) {
            Err(BridgeError::Failed(message)) => assert!(message.contains("boom")),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn kills_bridge_at_deadline() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let start = Instant::now();
        match run_with_deadline(cmd, None, Duration::from_millis(200)) {
            Err(BridgeError::Timeout { .. }) => {}
            _ => panic!("expected timeout"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn passes_stdin_through() {
        let cmd = Command::new("cat");
        let out = run_with_deadline(cmd, Some(b"hello".to_vec()), Duration::from_secs(5))
            .ok()
            .unwrap();
        assert_eq!(out.stdout, b"hello");
    }
}
