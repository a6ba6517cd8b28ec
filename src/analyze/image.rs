use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::capability::VisionModel;
use crate::core::error::Result;

/// Marker response used when no figure images were available to analyze.
/// Reconciliation recognizes it as an unusable source.
pub const NO_IMAGES_MARKER: &str = "Error: no valid images found";

/// Image-side analysis pass: summarize the extracted figure crops once, then
/// answer each question against the summary.
pub struct ImageAnalyzer {
    model: Arc<dyn VisionModel>,
}

impl ImageAnalyzer {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub fn summarize(&self, images: &[PathBuf]) -> Result<String> {
        let prompt = "Analyze these images from an AI model paper. Provide a detailed \
                      summary of any relevant information about the model's architecture, \
                      training process, performance, or other notable characteristics.";
        self.model.describe(images, prompt)
    }

    pub fn answer(&self, summary: &str, question: &str) -> Result<String> {
        let prompt = format!(
            "Based on the following summary of images from an AI model paper, answer \
             this question: {question}\n\nSummary: {summary}"
        );
        self.model.describe(&[], &prompt)
    }

    /// Full pass. With no images every answer is the no-images marker; model
    /// failures mark the affected answers instead of aborting.
    pub fn run(&self, images: &[PathBuf], questions: &[String]) -> Vec<(String, String)> {
        if images.is_empty() {
            return questions
                .iter()
                .map(|q| (q.clone(), NO_IMAGES_MARKER.to_string()))
                .collect();
        }

        let summary = match self.summarize(images) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "image summarization failed; marking all answers");
                return questions
                    .iter()
                    .map(|q| (q.clone(), format!("Error: {e}")))
                    .collect();
            }
        };

        questions
            .iter()
            .map(|question| {
                let response = match self.answer(&summary, question) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(question = %question, error = %e, "image answer failed");
                        format!("Error: {e}")
                    }
                };
                (question.clone(), response)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct EchoVision;

    impl VisionModel for EchoVision {
        fn describe(&self, images: &[PathBuf], prompt: &str) -> Result<String> {
            if prompt.starts_with("Analyze these images") {
                Ok(format!("summary over {} images", images.len()))
            } else {
                Ok("from the charts: 70B".to_string())
            }
        }
    }

    #[test]
    fn no_images_yields_marker_for_every_question() {
        let analyzer = ImageAnalyzer::new(Arc::new(EchoVision));
        let responses = analyzer.run(&[], &["q1".to_string(), "q2".to_string()]);
        assert_eq!(responses[0].1, NO_IMAGES_MARKER);
        assert_eq!(responses[1].1, NO_IMAGES_MARKER);
    }

    #[test]
    fn answers_against_image_summary() {
        let analyzer = ImageAnalyzer::new(Arc::new(EchoVision));
        let images = vec![PathBuf::from("fig1.png"), PathBuf::from("fig2.png")];
        let responses = analyzer.run(&images, &["How many parameters?".to_string()]);
        assert_eq!(responses[0].1, "from the charts: 70B");
    }
}
