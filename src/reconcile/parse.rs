use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::fields::FieldKind;

/// Typed value recovered from a reconciled answer, for fields with a
/// machine-readable shape. Free-text fields carry no separate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Number(f64),
    Items(Vec<String>),
    Date(String),
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"))
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static regex"))
}

/// Parse a typed value out of an answer according to the field's kind:
/// first decimal number for numeric fields, first `YYYY-MM-DD` match for
/// dates, comma-separated items for categorical fields.
pub fn parse_value(kind: FieldKind, answer: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Numeric => number_re()
            .find(answer)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(FieldValue::Number),
        FieldKind::Date => date_re()
            .find(answer)
            .map(|m| FieldValue::Date(m.as_str().to_string())),
        FieldKind::Categorical => {
            let items: Vec<String> = answer
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(FieldValue::Items(items))
            }
        }
        FieldKind::Text | FieldKind::Url => None,
    }
}
