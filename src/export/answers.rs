use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::Result;
use crate::export::write_json_atomic;
use crate::reconcile::{AnswerProvenance, AnswerRecord, ConfidenceLevel, FieldValue};

pub const ANSWERS_FILE: &str = "answers.json";

/// One entry of the answers artifact: the final answer plus the audit trail
/// of both source responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEntry {
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

/// Writes the final answers report, keyed by question text.
#[derive(Debug, Clone)]
pub struct AnswerReportExporter {
    out_dir: PathBuf,
}

impl AnswerReportExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn export(&self, records: &[AnswerRecord]) -> Result<PathBuf> {
        let report: BTreeMap<&str, AnswerEntry> = records
            .iter()
            .map(|r| {
                (
                    r.question.as_str(),
                    AnswerEntry {
                        final_answer: r.final_answer.clone(),
                        text_response: r.text_response.clone(),
                        image_response: r.image_response.clone(),
                        provenance: r.provenance,
                        confidence: r.confidence,
                        value: r.value.clone(),
                        notes: r.notes.clone(),
                        error: r.error.clone(),
                    },
                )
            })
            .collect();

        let path = self.out_dir.join(ANSWERS_FILE);
        write_json_atomic(&path, &report)?;
        info!(questions = report.len(), path = %path.display(), "wrote answers report");
        Ok(path)
    }
}
