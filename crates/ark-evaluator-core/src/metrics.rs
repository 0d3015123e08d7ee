//! Metric Registry & Field Validator (C6, §4.5).
//!
//! A closed registry of six metrics (plus two aliases) each declaring the
//! dataset fields they require, in a neutral vocabulary that this module
//! maps onto RAGAS-style engine field names (`user_input`, `response`,
//! `retrieved_contexts`, `reference`).

use std::collections::HashMap;

use ark_evaluator_types::{FieldRequirement, FieldType, FieldValue, MetricDescriptor, MetricKind};

use crate::error::MetricError;

const FIELD_USER_INPUT: &str = "user_input";
const FIELD_RESPONSE: &str = "response";
const FIELD_RETRIEVED_CONTEXTS: &str = "retrieved_contexts";
const FIELD_REFERENCE: &str = "reference";

fn field_mapping() -> Vec<(String, String)> {
    vec![
        ("input".to_string(), FIELD_USER_INPUT.to_string()),
        ("output".to_string(), FIELD_RESPONSE.to_string()),
        ("context".to_string(), FIELD_RETRIEVED_CONTEXTS.to_string()),
        ("ground_truth".to_string(), FIELD_REFERENCE.to_string()),
    ]
}

fn user_input_field() -> FieldRequirement {
    FieldRequirement::new(FIELD_USER_INPUT, FieldType::String, "the original user query")
}

fn response_field() -> FieldRequirement {
    FieldRequirement::new(FIELD_RESPONSE, FieldType::String, "the generated answer being judged")
}

fn retrieved_contexts_field() -> FieldRequirement {
    FieldRequirement::new(
        FIELD_RETRIEVED_CONTEXTS,
        FieldType::ListString,
        "the retrieved context passages supporting the response",
    )
}

fn reference_field() -> FieldRequirement {
    FieldRequirement::new(FIELD_REFERENCE, FieldType::String, "the ground-truth reference answer")
}

/// Full descriptor for one metric kind.
pub fn descriptor(kind: MetricKind) -> MetricDescriptor {
    let (display_name, description, required_fields, optional_fields): (&str, &str, Vec<FieldRequirement>, Vec<FieldRequirement>) =
        match kind {
            MetricKind::Relevance => (
                "Relevance",
                "how relevant the response is to the user's question",
                vec![user_input_field(), response_field()],
                vec![],
            ),
            MetricKind::Correctness => (
                "Correctness",
                "factual correctness of the response against a reference answer",
                vec![user_input_field(), response_field(), reference_field()],
                vec![],
            ),
            MetricKind::Similarity => (
                "Similarity",
                "semantic similarity between the response and a reference answer",
                vec![response_field(), reference_field()],
                vec![],
            ),
            MetricKind::Faithfulness => (
                "Faithfulness",
                "whether claims in the response are supported by the retrieved context",
                vec![user_input_field(), response_field(), retrieved_contexts_field()],
                vec![],
            ),
            MetricKind::ContextPrecision => (
                "Context Precision",
                "whether relevant context passages are ranked above irrelevant ones",
                vec![user_input_field(), retrieved_contexts_field(), reference_field()],
                vec![],
            ),
            MetricKind::ContextRecall => (
                "Context Recall",
                "whether the retrieved context covers everything the reference answer needs",
                vec![user_input_field(), retrieved_contexts_field(), reference_field()],
                vec![],
            ),
        };

    MetricDescriptor {
        display_name: display_name.to_string(),
        ragas_name: kind.ragas_name().to_string(),
        description: description.to_string(),
        required_fields,
        optional_fields,
        field_mapping: field_mapping(),
    }
}

/// All six canonical metric kinds, in a stable listing order.
pub fn all_kinds() -> &'static [MetricKind] {
    &[
        MetricKind::Relevance,
        MetricKind::Correctness,
        MetricKind::Similarity,
        MetricKind::Faithfulness,
        MetricKind::ContextPrecision,
        MetricKind::ContextRecall,
    ]
}

/// Inputs available to shape a dataset entry (§4.5). `context` is left
/// unset (not injected as an empty list) when the caller supplied none --
/// metrics that require non-empty context then fail validation, which is
/// the intended signal.
#[derive(Debug, Clone, Default)]
pub struct DatasetInputs {
    pub input: Option<String>,
    pub output: Option<String>,
    pub context: Option<Vec<String>>,
    pub ground_truth: Option<String>,
}

/// One shaped dataset entry: engine field name -> value.
pub type DatasetEntry = HashMap<String, FieldValue>;

/// Build the dataset entry that is the union of every requested metric's
/// required/optional fields, mapped through the neutral-to-engine field
/// mapping (§4.5).
pub fn prepare_dataset_for_metrics(metrics: &[MetricKind], inputs: &DatasetInputs) -> DatasetEntry {
    let mut entry = DatasetEntry::new();
    let needed: std::collections::HashSet<&str> = metrics
        .iter()
        .flat_map(|k| {
            let d = descriptor(*k);
            d.required_fields
                .into_iter()
                .chain(d.optional_fields)
                .map(|f| field_static_name(&f.name))
                .collect::<Vec<_>>()
        })
        .collect();

    if needed.contains(FIELD_USER_INPUT)
        && let Some(input) = &inputs.input
    {
        entry.insert(FIELD_USER_INPUT.to_string(), FieldValue::String(input.clone()));
    }
    if needed.contains(FIELD_RESPONSE)
        && let Some(output) = &inputs.output
    {
        entry.insert(FIELD_RESPONSE.to_string(), FieldValue::String(output.clone()));
    }
    if needed.contains(FIELD_RETRIEVED_CONTEXTS)
        && let Some(context) = &inputs.context
    {
        entry.insert(
            FIELD_RETRIEVED_CONTEXTS.to_string(),
            FieldValue::ListString(context.clone()),
        );
    }
    if needed.contains(FIELD_REFERENCE)
        && let Some(ground_truth) = &inputs.ground_truth
    {
        entry.insert(FIELD_REFERENCE.to_string(), FieldValue::String(ground_truth.clone()));
    }
    entry
}

/// `field_mapping` stores owned `String`s; required/optional field names
/// are always one of the four well-known engine names, so this is a cheap
/// identity lookup rather than a real mapping traversal.
fn field_static_name(name: &str) -> &'static str {
    match name {
        FIELD_USER_INPUT => FIELD_USER_INPUT,
        FIELD_RESPONSE => FIELD_RESPONSE,
        FIELD_RETRIEVED_CONTEXTS => FIELD_RETRIEVED_CONTEXTS,
        FIELD_REFERENCE => FIELD_REFERENCE,
        _ => "",
    }
}

/// Validate a dataset entry against one metric's declared required fields
/// (§4.5): presence, type match, and non-empty content.
pub fn validate_input(kind: MetricKind, entry: &DatasetEntry) -> Result<(), MetricError> {
    let descriptor = descriptor(kind);
    for field in &descriptor.required_fields {
        let Some(value) = entry.get(&field.name) else {
            return Err(MetricError::MissingField {
                metric: kind.canonical_name().to_string(),
                field: field.name.clone(),
            });
        };
        if value.type_name() != field.field_type {
            return Err(MetricError::TypeMismatch {
                metric: kind.canonical_name().to_string(),
                field: field.name.clone(),
                expected: field.field_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
        if !value.is_content_nonempty() {
            return Err(MetricError::EmptyField {
                metric: kind.canonical_name().to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

/// Result of validating a batch of requested metric names against a
/// shaped dataset entry (§4.5).
#[derive(Debug, Clone, Default)]
pub struct PartitionedMetrics {
    pub valid: Vec<MetricKind>,
    pub invalid: Vec<String>,
    pub validation_errors: HashMap<String, String>,
}

/// Resolve caller-supplied metric names (aliases included) and partition
/// them into `valid`/`invalid` against the shaped dataset entry.
/// `valid ⊕ invalid` always accounts for every requested name: unknown
/// names are recorded as invalid with an "unknown metric" message rather
/// than silently dropped.
pub fn partition_requested_metrics(requested: &[String], entry: &DatasetEntry) -> PartitionedMetrics {
    let mut result = PartitionedMetrics::default();
    for name in requested {
        let Some(kind) = MetricKind::from_name(name) else {
            result.invalid.push(name.clone());
            result
                .validation_errors
                .insert(name.clone(), MetricError::UnknownMetric(name.clone()).to_string());
            continue;
        };
        match validate_input(kind, entry) {
            Ok(()) => result.valid.push(kind),
            Err(e) => {
                result.invalid.push(name.clone());
                result.validation_errors.insert(name.clone(), e.to_string());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(input: Option<&str>, output: Option<&str>, context: Option<Vec<&str>>, gt: Option<&str>) -> DatasetInputs {
        DatasetInputs {
            input: input.map(String::from),
            output: output.map(String::from),
            context: context.map(|c| c.into_iter().map(String::from).collect()),
            ground_truth: gt.map(String::from),
        }
    }

    #[test]
    fn relevance_valid_with_input_and_output_only() {
        let inputs = dataset(Some("q"), Some("a"), None, None);
        let entry = prepare_dataset_for_metrics(&[MetricKind::Relevance], &inputs);
        assert!(validate_input(MetricKind::Relevance, &entry).is_ok());
    }

    #[test]
    fn faithfulness_fails_without_context() {
        let inputs = dataset(Some("q"), Some("a"), None, None);
        let entry = prepare_dataset_for_metrics(&[MetricKind::Faithfulness], &inputs);
        assert!(validate_input(MetricKind::Faithfulness, &entry).is_err());
    }

    #[test]
    fn empty_context_list_is_rejected_as_empty_content() {
        let inputs = dataset(Some("q"), Some("a"), Some(vec!["", "  "]), None);
        let entry = prepare_dataset_for_metrics(&[MetricKind::Faithfulness], &inputs);
        assert!(validate_input(MetricKind::Faithfulness, &entry).is_err());
    }

    #[test]
    fn partition_separates_valid_and_invalid_with_alias_resolution() {
        let inputs = dataset(Some("q"), Some("a"), None, None);
        let requested = vec!["helpfulness".to_string(), "faithfulness".to_string(), "bogus".to_string()];
        let kinds: Vec<MetricKind> = requested
            .iter()
            .filter_map(|n| MetricKind::from_name(n))
            .collect();
        let entry = prepare_dataset_for_metrics(&kinds, &inputs);
        let partitioned = partition_requested_metrics(&requested, &entry);
        assert_eq!(partitioned.valid, vec![MetricKind::Relevance]);
        assert_eq!(partitioned.invalid.len(), 2);
        assert!(partitioned.validation_errors.contains_key("faithfulness"));
        assert!(partitioned.validation_errors.contains_key("bogus"));
    }

    #[test]
    fn descriptor_exposes_field_mapping() {
        let d = descriptor(MetricKind::Relevance);
        assert_eq!(d.ragas_name, "answer_relevancy");
        assert!(d.field_mapping.iter().any(|(n, e)| n == "input" && e == "user_input"));
    }
}
