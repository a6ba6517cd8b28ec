use std::sync::Arc;

use tracing::warn;

use crate::capability::LanguageModel;
use crate::core::error::Result;

/// Text-side analysis pass: summarize the full paper text once, then answer
/// each question against the summary.
pub struct TextAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl TextAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "Analyze the following text from an academic paper about an AI model. \
             Extract and summarize key information about the model's architecture, \
             training process, performance, and any other notable characteristics. \
             Provide a detailed summary that can be used to answer specific questions later.\n\n\
             Text: {text}"
        );
        self.model.complete(&prompt)
    }

    pub fn answer(&self, summary: &str, question: &str) -> Result<String> {
        let prompt = format!(
            "Based on the following summary of an AI model paper, answer this question:\n\
             {question}\n\n\
             Summary: {summary}"
        );
        self.model.complete(&prompt)
    }

    /// Full pass. Model failures never abort the pass; a failed call leaves
    /// an explicit error marker in that question's response, which
    /// reconciliation treats as an unusable source.
    pub fn run(&self, text: &str, questions: &[String]) -> Vec<(String, String)> {
        let summary = match self.summarize(text) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "text summarization failed; marking all answers");
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
                        warn!(question = %question, error = %e, "text answer failed");
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

    use crate::core::error::PipelineError;

    struct ScriptedModel;

    impl LanguageModel for ScriptedModel {
        fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.starts_with("Analyze the following text") {
                Ok("summary of the paper".to_string())
            } else if prompt.contains("How many parameters") {
                Ok("120B parameters".to_string())
            } else {
                Ok("unknown".to_string())
            }
        }
    }

    struct BrokenModel;

    impl LanguageModel for BrokenModel {
        fn complete(&self, _prompt: &str) -> Result<String> {
            Err(PipelineError::ModelCall {
                stage: "language-model",
                message: "connection refused".into(),
            })
        }
    }

    #[test]
    fn answers_each_question_against_the_summary() {
        let analyzer = TextAnalyzer::new(Arc::new(ScriptedModel));
        let responses = analyzer.run(
            "paper text",
            &["How many parameters?".to_string(), "Who wrote it?".to_string()],
        );
        assert_eq!(responses[0].1, "120B parameters");
        assert_eq!(responses[1].1, "unknown");
    }

    #[test]
    fn model_failure_becomes_error_marker() {
        let analyzer = TextAnalyzer::new(Arc::new(BrokenModel));
        let responses = analyzer.run("paper text", &["Any question?".to_string()]);
        assert_eq!(responses.len(), 1);
        assert!(responses[0].1.starts_with("Error:"));
    }
}
