use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};

/// Expected shape of a field's answer, used to parse the reconciled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
    Categorical,
    Date,
    Url,
}

/// One extractable model-card field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub prompt: String,
    #[serde(default)]
    pub requires_image: bool,
}

/// Immutable registry of the fields to extract, keyed by field identifier.
///
/// Loaded once at startup (built-in table or a YAML file) and passed
/// explicitly to whatever needs field semantics. A `BTreeMap` keeps question
/// order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldSpec>,
}

impl FieldRegistry {
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let fields: BTreeMap<String, FieldSpec> = serde_yaml::from_str(&raw)
            .map_err(|e| PipelineError::Registry(format!("{}: {e}", path.display())))?;
        if fields.is_empty() {
            return Err(PipelineError::Registry(format!(
                "{}: no fields defined",
                path.display()
            )));
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    /// Question prompts in registry order.
    pub fn questions(&self) -> Vec<String> {
        self.fields.values().map(|f| f.prompt.clone()).collect()
    }

    /// Look up a field spec by its question prompt.
    pub fn spec_for_question(&self, question: &str) -> Option<&FieldSpec> {
        self.fields.values().find(|f| f.prompt == question)
    }

    /// The built-in model-card field table.
    pub fn builtin() -> Self {
        let mut fields = BTreeMap::new();
        let mut add = |key: &str, kind: FieldKind, prompt: &str| {
            fields.insert(
                key.to_string(),
                FieldSpec {
                    kind,
                    prompt: prompt.to_string(),
                    requires_image: false,
                },
            );
        };

        add(
            "abstract",
            FieldKind::Text,
            "What is the abstract of the paper?",
        );
        add(
            "authors",
            FieldKind::Text,
            "Who are the authors of the paper?",
        );
        add(
            "base_model",
            FieldKind::Categorical,
            "What base model, if any, was this model fine-tuned from?",
        );
        add(
            "batch_size",
            FieldKind::Numeric,
            "What was the batch size used during training?",
        );
        add(
            "citations",
            FieldKind::Numeric,
            "How many citations does this paper have?",
        );
        add(
            "confidence",
            FieldKind::Categorical,
            "What is the confidence level in the recorded values for Training compute, Parameters, and Training dataset size?",
        );
        add(
            "country",
            FieldKind::Categorical,
            "What country or countries are associated with the developing organization(s)?",
        );
        add(
            "domain",
            FieldKind::Categorical,
            "What is the machine learning domain of application for this model?",
        );
        add(
            "epochs",
            FieldKind::Numeric,
            "How many epochs were used to train the model?",
        );
        add(
            "finetune_compute",
            FieldKind::Numeric,
            "How much compute was used to fine-tune the model, if applicable?",
        );
        add(
            "hardware_quantity",
            FieldKind::Numeric,
            "What quantity of hardware was used in training?",
        );
        add(
            "hardware_utilization",
            FieldKind::Numeric,
            "What was the hardware utilization ratio?",
        );
        add(
            "link",
            FieldKind::Url,
            "What are the links to the best sources documenting this model?",
        );
        add(
            "notability_criteria",
            FieldKind::Categorical,
            "What notability criteria does this model meet?",
        );
        add(
            "organization",
            FieldKind::Categorical,
            "What organization(s) created the model?",
        );
        add(
            "organization_categorization",
            FieldKind::Categorical,
            "How is the organization categorized?",
        );
        add(
            "parameters",
            FieldKind::Numeric,
            "How many learnable parameters does the model have?",
        );
        add(
            "publication_date",
            FieldKind::Date,
            "What is the publication, announcement, or release date of the model?",
        );
        add(
            "reference",
            FieldKind::Text,
            "What is the literature reference for the model?",
        );
        add("system", FieldKind::Text, "What is the name of the model?");
        add(
            "training_compute",
            FieldKind::Numeric,
            "How much compute was used to train the model, in FLOP?",
        );
        add(
            "training_compute_cost",
            FieldKind::Numeric,
            "What was the estimated training compute cost in 2023 USD?",
        );
        add(
            "training_dataset",
            FieldKind::Categorical,
            "What dataset(s) was used to train the model?",
        );
        add(
            "training_dataset_size",
            FieldKind::Numeric,
            "How many datapoints were in the training dataset?",
        );
        add(
            "training_hardware",
            FieldKind::Categorical,
            "What type of training hardware was used?",
        );
        add(
            "training_time",
            FieldKind::Numeric,
            "How long did the training take, in hours?",
        );

        for (key, prompt) in [
            (
                "model_architecture_diagram",
                "Describe the model architecture based on any diagrams or figures in the paper.",
            ),
            (
                "performance_graphs",
                "Analyze any performance graphs or charts in the paper and describe the model's performance trends.",
            ),
        ] {
            fields.insert(
                key.to_string(),
                FieldSpec {
                    kind: FieldKind::Text,
                    prompt: prompt.to_string(),
                    requires_image: true,
                },
            );
        }

        Self { fields }
    }
}
