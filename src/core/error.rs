use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the extraction and reconciliation pipeline.
///
/// Document-scoped failures (`DocumentRead`, `Extraction`) abort the current
/// document. `Detection` is page-scoped: the page is skipped with a warning
/// and the rest of the document continues. A missing caption is not an error
/// at all; it is represented as an empty string.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read document {}: {message}", .path.display())]
    DocumentRead { path: PathBuf, message: String },

    #[error("text extraction failed: {message}")]
    Extraction { message: String },

    #[error("figure detection failed: {message}")]
    Detection { message: String },

    #[error("model call failed in {stage}: {message}")]
    ModelCall { stage: &'static str, message: String },

    #[error("reconciliation failed for question {question:?}: {message}")]
    Reconciliation { question: String, message: String },

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("invalid field registry: {0}")]
    Registry(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    /// Whether a caller may reasonably retry the failed operation. Retry
    /// policy itself is the caller's decision; the pipeline never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Detection { .. }
                | PipelineError::ModelCall { .. }
                | PipelineError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_call_failures_are_retryable() {
        assert!(PipelineError::Timeout {
            stage: "detect",
            seconds: 30
        }
        .is_retryable());
        assert!(PipelineError::Detection {
            message: "bridge exited with status 1".into()
        }
        .is_retryable());
    }

    #[test]
    fn document_failures_are_not_retryable() {
        let err = PipelineError::DocumentRead {
            path: PathBuf::from("paper.pdf"),
            message: "not a PDF".into(),
        };
        assert!(!err.is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
    }
}
