//! Metric descriptors and the field vocabulary used by the field validator
//! (§3, §4.5).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a metric's input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    ListString,
    Int,
    Float,
    Bool,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::ListString => "list<string>",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        };
        write!(f, "{s}")
    }
}

/// A value supplied for a dataset field, shaped so it can be validated
/// against a [`FieldType`] without re-parsing JSON each time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    ListString(Vec<String>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn type_name(&self) -> FieldType {
        match self {
            FieldValue::String(_) => FieldType::String,
            FieldValue::ListString(_) => FieldType::ListString,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Bool(_) => FieldType::Bool,
        }
    }

    /// Non-empty per the validator's content check (§4.5): trimmed
    /// non-empty string, or a list with at least one non-empty element.
    pub fn is_content_nonempty(&self) -> bool {
        match self {
            FieldValue::String(s) => !s.trim().is_empty(),
            FieldValue::ListString(items) => items.iter().any(|i| !i.trim().is_empty()),
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => true,
        }
    }
}

/// One required or optional field a metric declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRequirement {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
    #[serde(default)]
    pub example: Option<String>,
}

impl FieldRequirement {
    pub fn new(name: impl Into<String>, field_type: FieldType, description: impl Into<String>) -> Self {
        FieldRequirement {
            name: name.into(),
            field_type,
            description: description.into(),
            example: None,
        }
    }
}

/// The canonical metric identity recognized by the registry (§4.5).
/// `Alias` variants resolve to a canonical kind but are preserved so the
/// caller-visible name and the resolved name can both be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Relevance,
    Correctness,
    Similarity,
    Faithfulness,
    ContextPrecision,
    ContextRecall,
}

impl MetricKind {
    /// Parse a caller-supplied metric name, resolving aliases
    /// (`helpfulness` → `relevance`, `clarity` → `similarity`) to their
    /// canonical kind. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "relevance" | "helpfulness" => Some(MetricKind::Relevance),
            "correctness" => Some(MetricKind::Correctness),
            "similarity" | "clarity" => Some(MetricKind::Similarity),
            "faithfulness" => Some(MetricKind::Faithfulness),
            "context_precision" => Some(MetricKind::ContextPrecision),
            "context_recall" => Some(MetricKind::ContextRecall),
            _ => None,
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            MetricKind::Relevance => "relevance",
            MetricKind::Correctness => "correctness",
            MetricKind::Similarity => "similarity",
            MetricKind::Faithfulness => "faithfulness",
            MetricKind::ContextPrecision => "context_precision",
            MetricKind::ContextRecall => "context_recall",
        }
    }

    pub fn ragas_name(&self) -> &'static str {
        match self {
            MetricKind::Relevance => "answer_relevancy",
            MetricKind::Correctness => "answer_correctness",
            MetricKind::Similarity => "answer_similarity",
            MetricKind::Faithfulness => "faithfulness",
            MetricKind::ContextPrecision => "context_precision",
            MetricKind::ContextRecall => "context_recall",
        }
    }
}

/// Full descriptor for a metric, as returned by
/// `GET /providers/{provider}/metrics/{metric}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    pub display_name: String,
    pub ragas_name: String,
    pub description: String,
    pub required_fields: Vec<FieldRequirement>,
    pub optional_fields: Vec<FieldRequirement>,
    /// Neutral vocabulary -> engine field name, e.g. `input_text` -> `user_input`.
    pub field_mapping: Vec<(String, String)>,
}
