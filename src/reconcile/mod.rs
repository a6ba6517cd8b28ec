//! Deterministic reconciliation of the text-derived and image-derived answer
//! for each question into one final answer with provenance and confidence.

pub mod compare;
pub mod parse;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::LanguageModel;
use crate::core::error::{PipelineError, Result};
use crate::core::fields::FieldRegistry;
use crate::core::model::QuestionAnswerPair;

pub use parse::FieldValue;

/// Which source(s) the final answer was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerProvenance {
    TextOnly,
    ImageOnly,
    /// Both sources were usable and agreed; the text answer was kept.
    Agreement,
    /// Both sources were usable but disagreed; an adjudication call decided.
    Adjudicated,
}

/// Confidence read off the final answer's phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Confident,
    Likely,
    Speculative,
    Unknown,
}

/// A response is unusable as a source when it is empty after trimming or is
/// an explicit error marker.
pub fn is_unusable(response: &str) -> bool {
    let trimmed = response.trim();
    trimmed.is_empty() || trimmed.to_lowercase().starts_with("error")
}

/// Map answer phrasing to a confidence level.
pub fn assess_confidence(answer: &str) -> ConfidenceLevel {
    let lower = answer.to_lowercase();
    if lower.contains("i'm confident") || lower.contains("the text clearly states") {
        ConfidenceLevel::Confident
    } else if lower.contains("it's likely") || lower.contains("the text suggests") {
        ConfidenceLevel::Likely
    } else if lower.contains("it's possible") || lower.contains("the text hints at") {
        ConfidenceLevel::Speculative
    } else {
        ConfidenceLevel::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledAnswer {
    pub final_answer: String,
    pub provenance: AnswerProvenance,
    pub confidence: ConfidenceLevel,
    /// Audit note, e.g. the losing answer when sources disagreed and no
    /// adjudicator was available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Reconciliation contract: must be deterministic for identical inputs, and
/// when exactly one source is usable the final answer derives from it alone,
/// with no error text injected.
pub trait AnswerReconciler: Send + Sync {
    fn reconcile(
        &self,
        question: &str,
        text_response: &str,
        image_response: &str,
    ) -> Result<ReconciledAnswer>;
}

/// Default reconciliation engine.
///
/// Single-source cases are resolved by rule. When both sources are usable,
/// near-identical answers short-circuit as agreement; genuine disagreement
/// goes to an adjudication prompt over the language-model capability. With
/// no adjudicator configured the text answer wins (it saw the whole paper)
/// and the competing image answer is preserved in the notes.
pub struct RuleBasedReconciler {
    model: Option<Arc<dyn LanguageModel>>,
    agreement_threshold: f32,
}

impl RuleBasedReconciler {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            agreement_threshold: 0.85,
        }
    }

    pub fn with_agreement_threshold(mut self, threshold: f32) -> Self {
        self.agreement_threshold = threshold;
        self
    }

    fn adjudicate(
        &self,
        question: &str,
        text_response: &str,
        image_response: &str,
        similarity: f32,
    ) -> Result<ReconciledAnswer> {
        if let Some(model) = &self.model {
            let prompt = format!(
                "Question: {question}\n\n\
                 Information from text: {text_response}\n\n\
                 Information from images: {image_response}\n\n\
                 Based on this information, provide a final answer to the question. \
                 If calculation is needed, show your work. If the information is \
                 inconsistent or unclear, explain why."
            );
            let final_answer = model.complete(&prompt)?;
            let confidence = assess_confidence(&final_answer);
            return Ok(ReconciledAnswer {
                final_answer,
                provenance: AnswerProvenance::Adjudicated,
                confidence,
                notes: None,
            });
        }

        debug!(question, similarity, "no adjudicator; keeping text answer");
        Ok(ReconciledAnswer {
            final_answer: text_response.trim().to_string(),
            provenance: AnswerProvenance::TextOnly,
            confidence: ConfidenceLevel::Speculative,
            notes: Some(format!(
                "image-derived answer disagreed (similarity {similarity:.2}): {image_response}"
            )),
        })
    }
}

impl AnswerReconciler for RuleBasedReconciler {
    fn reconcile(
        &self,
        question: &str,
        text_response: &str,
        image_response: &str,
    ) -> Result<ReconciledAnswer> {
        let text_usable = !is_unusable(text_response);
        let image_usable = !is_unusable(image_response);

        match (text_usable, image_usable) {
            (false, false) => Err(PipelineError::Reconciliation {
                question: question.to_string(),
                message: "both answer sources are empty or errored".to_string(),
            }),
            (true, false) => {
                let final_answer = text_response.trim().to_string();
                let confidence = assess_confidence(&final_answer);
                Ok(ReconciledAnswer {
                    final_answer,
                    provenance: AnswerProvenance::TextOnly,
                    confidence,
                    notes: None,
                })
            }
            (false, true) => {
                let final_answer = image_response.trim().to_string();
                let confidence = assess_confidence(&final_answer);
                Ok(ReconciledAnswer {
                    final_answer,
                    provenance: AnswerProvenance::ImageOnly,
                    confidence,
                    notes: None,
                })
            }
            (true, true) => {
                let similarity = compare::answer_similarity(text_response, image_response);
                if similarity >= self.agreement_threshold {
                    let final_answer = text_response.trim().to_string();
                    let confidence = assess_confidence(&final_answer);
                    Ok(ReconciledAnswer {
                        final_answer,
                        provenance: AnswerProvenance::Agreement,
                        confidence,
                        notes: None,
                    })
                } else {
                    self.adjudicate(question, text_response, image_response, similarity)
                }
            }
        }
    }
}

/// Final per-question record as written to the answers artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    /// Empty when reconciliation failed; see `error`.
    pub final_answer: String,
    pub text_response: String,
    pub image_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<AnswerProvenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reconcile every answer pair. Per-question failures are recorded on the
/// answer record rather than aborting the report.
pub fn reconcile_all(
    reconciler: &dyn AnswerReconciler,
    registry: &FieldRegistry,
    pairs: &[QuestionAnswerPair],
) -> Vec<AnswerRecord> {
    pairs
        .iter()
        .map(|pair| {
            match reconciler.reconcile(&pair.question, &pair.text_response, &pair.image_response) {
                Ok(reconciled) => {
                    let value = registry
                        .spec_for_question(&pair.question)
                        .and_then(|spec| parse::parse_value(spec.kind, &reconciled.final_answer));
                    AnswerRecord {
                        question: pair.question.clone(),
                        final_answer: reconciled.final_answer,
                        text_response: pair.text_response.clone(),
                        image_response: pair.image_response.clone(),
                        provenance: Some(reconciled.provenance),
                        confidence: Some(reconciled.confidence),
                        value,
                        notes: reconciled.notes,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(question = %pair.question, error = %e, "reconciliation failed");
                    AnswerRecord {
                        question: pair.question.clone(),
                        final_answer: String::new(),
                        text_response: pair.text_response.clone(),
                        image_response: pair.image_response.clone(),
                        provenance: None,
                        confidence: None,
                        value: None,
                        notes: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::core::fields::FieldRegistry;

    struct FixedAdjudicator;

    impl LanguageModel for FixedAdjudicator {
        fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("adjudicated answer".to_string())
        }
    }

    fn reconciler() -> RuleBasedReconciler {
        RuleBasedReconciler::new(None)
    }

    #[test]
    fn errored_image_source_falls_back_to_text_alone() {
        let answer = reconciler()
            .reconcile(
                "How many learnable parameters does the model have?",
                "120B parameters",
                "Error: no valid images found",
            )
            .unwrap();
        assert_eq!(answer.final_answer, "120B parameters");
        assert_eq!(answer.provenance, AnswerProvenance::TextOnly);
        assert!(!answer.final_answer.to_lowercase().contains("error"));
    }

    #[test]
    fn empty_text_source_falls_back_to_image_alone() {
        let answer = reconciler()
            .reconcile("q", "   ", "70B according to the scaling chart")
            .unwrap();
        assert_eq!(answer.final_answer, "70B according to the scaling chart");
        assert_eq!(answer.provenance, AnswerProvenance::ImageOnly);
    }

    #[test]
    fn both_sources_unusable_is_a_reconciliation_error() {
        let err = reconciler().reconcile("q", "", "Error: timeout").unwrap_err();
        assert!(matches!(err, PipelineError::Reconciliation { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn agreeing_sources_short_circuit() {
        let answer = reconciler()
            .reconcile("q", "70B parameters", "70B parameters")
            .unwrap();
        assert_eq!(answer.provenance, AnswerProvenance::Agreement);
        assert_eq!(answer.final_answer, "70B parameters");
    }

    #[test]
    fn disagreeing_sources_go_to_the_adjudicator() {
        let with_model = RuleBasedReconciler::new(Some(Arc::new(FixedAdjudicator)));
        let answer = with_model
            .reconcile("q", "70B parameters", "13B parameters")
            .unwrap();
        assert_eq!(answer.provenance, AnswerProvenance::Adjudicated);
        assert_eq!(answer.final_answer, "adjudicated answer");
    }

    #[test]
    fn disagreement_without_adjudicator_keeps_text_and_notes_it() {
        let answer = reconciler()
            .reconcile("q", "70B parameters", "13B parameters")
            .unwrap();
        assert_eq!(answer.final_answer, "70B parameters");
        assert_eq!(answer.provenance, AnswerProvenance::TextOnly);
        assert!(answer.notes.unwrap().contains("13B parameters"));
    }

    #[test]
    fn reconciliation_is_deterministic() {
        let r = reconciler();
        let a = r.reconcile("q", "answer one", "answer two").unwrap();
        let b = r.reconcile("q", "answer one", "answer two").unwrap();
        assert_eq!(a.final_answer, b.final_answer);
        assert_eq!(a.provenance, b.provenance);
    }

    #[test]
    fn confidence_tracks_answer_phrasing() {
        assert_eq!(
            assess_confidence("I'm confident the model has 70B parameters."),
            ConfidenceLevel::Confident
        );
        assert_eq!(
            assess_confidence("The text suggests roughly 1T tokens."),
            ConfidenceLevel::Likely
        );
        assert_eq!(
            assess_confidence("It's possible the run used TPUs."),
            ConfidenceLevel::Speculative
        );
        assert_eq!(assess_confidence("70B."), ConfidenceLevel::Unknown);
    }

    #[test]
    fn reconcile_all_records_per_question_failures() {
        let registry = FieldRegistry::builtin();
        let pairs = vec![
            QuestionAnswerPair::new(
                "How many learnable parameters does the model have?",
                "70 billion".to_string(),
                "Error: no valid images found".to_string(),
            ),
            QuestionAnswerPair::new("q2", String::new(), "Error: timeout".to_string()),
        ];
        let records = reconcile_all(&reconciler(), &registry, &pairs);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].final_answer, "70 billion");
        assert_eq!(records[0].value, Some(FieldValue::Number(70.0)));
        assert!(records[0].error.is_none());
        assert_eq!(records[1].final_answer, "");
        assert!(records[1].error.is_some());
    }
}
