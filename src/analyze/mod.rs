//! Independent text and image analysis passes over the extracted content,
//! producing one `(text_response, image_response)` pair per question for
//! reconciliation. The two passes share nothing and run concurrently.

pub mod image;
pub mod text;

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::cancel::CancelFlag;
use crate::core::error::{PipelineError, Result};
use crate::core::model::QuestionAnswerPair;

pub use image::{ImageAnalyzer, NO_IMAGES_MARKER};
pub use text::TextAnalyzer;

/// Prepend the paper abstract to the document text when one is available.
pub fn with_abstract(text: &str, paper_abstract: Option<&str>) -> String {
    match paper_abstract {
        Some(a) if !a.trim().is_empty() => format!("Abstract:\n{a}\n\n{text}"),
        _ => text.to_string(),
    }
}

/// Run both analysis passes concurrently and pair their per-question
/// responses. Answer order follows `questions`; neither pass sees the
/// other's output.
pub async fn analyze_document(
    text_analyzer: Arc<TextAnalyzer>,
    image_analyzer: Arc<ImageAnalyzer>,
    document_text: String,
    image_paths: Vec<PathBuf>,
    questions: Vec<String>,
    cancel: &CancelFlag,
) -> Result<Vec<QuestionAnswerPair>> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let text_questions = questions.clone();
    let image_questions = questions.clone();

    let text_task = tokio::task::spawn_blocking(move || {
        text_analyzer.run(&document_text, &text_questions)
    });
    let image_task = tokio::task::spawn_blocking(move || {
        image_analyzer.run(&image_paths, &image_questions)
    });

    let (text_responses, image_responses) = tokio::join!(text_task, image_task);
    let text_responses = text_responses.map_err(|e| PipelineError::ModelCall {
        stage: "text-analysis",
        message: format!("worker failed: {e}"),
    })?;
    let image_responses = image_responses.map_err(|e| PipelineError::ModelCall {
        stage: "image-analysis",
        message: format!("worker failed: {e}"),
    })?;

    Ok(pair_responses(&questions, text_responses, image_responses))
}

/// Zip per-question responses from the two passes into answer pairs,
/// preserving question order.
pub fn pair_responses(
    questions: &[String],
    text_responses: Vec<(String, String)>,
    image_responses: Vec<(String, String)>,
) -> Vec<QuestionAnswerPair> {
    questions
        .iter()
        .map(|question| {
            let text_response = text_responses
                .iter()
                .find(|(q, _)| q == question)
                .map(|(_, r)| r.clone())
                .unwrap_or_default();
            let image_response = image_responses
                .iter()
                .find(|(q, _)| q == question)
                .map(|(_, r)| r.clone())
                .unwrap_or_default();
            QuestionAnswerPair::new(question.clone(), text_response, image_response)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prepends_abstract_when_present() {
        assert_eq!(
            with_abstract("body", Some("short abstract")),
            "Abstract:\nshort abstract\n\nbody"
        );
        assert_eq!(with_abstract("body", None), "body");
        assert_eq!(with_abstract("body", Some("   ")), "body");
    }

    #[test]
    fn pairs_responses_in_question_order() {
        let questions = vec!["a?".to_string(), "b?".to_string()];
        let text = vec![
            ("b?".to_string(), "text b".to_string()),
            ("a?".to_string(), "text a".to_string()),
        ];
        let image = vec![("a?".to_string(), "image a".to_string())];

        let pairs = pair_responses(&questions, text, image);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "a?");
        assert_eq!(pairs[0].text_response, "text a");
        assert_eq!(pairs[0].image_response, "image a");
        assert_eq!(pairs[1].text_response, "text b");
        assert_eq!(pairs[1].image_response, "");
        assert!(pairs[0].final_answer.is_none());
    }
}
