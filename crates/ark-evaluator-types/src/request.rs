//! The unified `EvaluationRequest`/`EvaluationResponse` wire shapes (§3, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `type` discriminant on an [`EvaluationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Direct,
    Baseline,
    Query,
    Batch,
    Event,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestType::Direct => "direct",
            RequestType::Baseline => "baseline",
            RequestType::Query => "query",
            RequestType::Batch => "batch",
            RequestType::Event => "event",
        };
        write!(f, "{s}")
    }
}

/// Reference to a `Query` CRD, with an optional response-target selector
/// (§3: a bare `name` or a `type:name` compound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, rename = "responseTarget")]
    pub response_target: Option<String>,
}

/// One event-DSL rule (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub name: String,
    pub expression: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// The variant-typed `config` payload; exactly one shape is populated per
/// `type` (§3 invariant). `serde(untagged)` disambiguates on field shape
/// since each variant (other than `Baseline`, which carries none) has a
/// field name the others don't.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationConfig {
    Direct {
        input: String,
        output: String,
    },
    Query {
        #[serde(rename = "queryRef")]
        query_ref: QueryRef,
    },
    Batch {
        evaluations: Vec<EvaluationRequest>,
    },
    Event {
        rules: Vec<EventRule>,
    },
    /// `baseline` requests carry no `config` fields; golden examples travel
    /// through `parameters["golden-examples"]` instead (§3).
    Baseline {},
}

/// A single free-form parameter value (§3: strings, lists, or mappings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Str(String),
    List(Vec<String>),
    Map(HashMap<String, String>),
}

/// The `parameters` mapping carried on every [`EvaluationRequest`], with
/// typed accessors for the recognized keys (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(pub HashMap<String, ParameterValue>);

impl Parameters {
    pub fn new() -> Self {
        Parameters(HashMap::new())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ParameterValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get_str(key)?.trim().parse::<f64>().ok()
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_str(key)?.trim().parse::<u32>().ok()
    }

    /// A list parameter, accepting either a JSON list or a CSV string
    /// (`evaluation_criteria` is documented as "list or csv", §6).
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key)? {
            ParameterValue::List(items) => Some(items.clone()),
            ParameterValue::Str(s) => Some(
                s.split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect(),
            ),
            ParameterValue::Map(_) => None,
        }
    }

    /// Keys under a dotted prefix, e.g. `"azure."`, mapped without the
    /// prefix (used for provider-credential detection, §4.6).
    pub fn prefixed(&self, prefix: &str) -> HashMap<String, String> {
        self.0
            .iter()
            .filter_map(|(k, v)| {
                let rest = k.strip_prefix(prefix)?;
                match v {
                    ParameterValue::Str(s) => Some((rest.to_string(), s.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.keys().any(|k| k.starts_with(prefix))
    }

    pub fn min_score(&self) -> f64 {
        self.get_f64("min-score")
            .or_else(|| self.get_f64("threshold"))
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(0.7)
    }

    pub fn provider(&self) -> String {
        self.get_str("provider")
            .unwrap_or("ark")
            .to_ascii_lowercase()
    }
}

/// `GoldenExample` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenExample {
    pub input: String,
    #[serde(rename = "expectedOutput")]
    pub expected_output: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, rename = "expectedMinScore")]
    pub expected_min_score: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// The unified evaluation request (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(rename = "evaluatorName")]
    pub evaluator_name: String,
    pub config: EvaluationConfig,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Token usage, summed across one or more LLM calls (§3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// The unified evaluation response (§3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Decimal-string score in `[0, 1]`, or `None` on a hard (not-judged)
    /// failure so callers can distinguish "judged and failed" from
    /// "not judged" (§7).
    pub score: Option<String>,
    pub passed: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(rename = "tokenUsage", default)]
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResponse {
    pub fn score_value(&self) -> Option<f64> {
        self.score.as_deref()?.parse().ok()
    }

    pub fn failure(error_type: &str, message: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("error_type".to_string(), error_type.to_string());
        EvaluationResponse {
            score: None,
            passed: false,
            metadata,
            token_usage: TokenUsage::default(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_config_roundtrips() {
        let json = r#"{"input": "2+2?", "output": "4"}"#;
        let cfg: EvaluationConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(cfg, EvaluationConfig::Direct { .. }));
    }

    #[test]
    fn query_config_with_response_target() {
        let json = r#"{"queryRef": {"name": "q1", "namespace": "ns", "responseTarget": "model:b"}}"#;
        let cfg: EvaluationConfig = serde_json::from_str(json).unwrap();
        match cfg {
            EvaluationConfig::Query { query_ref } => {
                assert_eq!(query_ref.response_target.as_deref(), Some("model:b"));
            }
            _ => panic!("expected Query variant"),
        }
    }

    #[test]
    fn baseline_config_is_empty() {
        let cfg: EvaluationConfig = serde_json::from_str("{}").unwrap();
        assert!(matches!(cfg, EvaluationConfig::Baseline {}));
    }

    #[test]
    fn parameters_get_list_accepts_csv() {
        let mut map = HashMap::new();
        map.insert(
            "evaluation_criteria".to_string(),
            ParameterValue::Str("accuracy, clarity ,tone".to_string()),
        );
        let params = Parameters(map);
        assert_eq!(
            params.get_list("evaluation_criteria"),
            Some(vec![
                "accuracy".to_string(),
                "clarity".to_string(),
                "tone".to_string()
            ])
        );
    }

    #[test]
    fn min_score_defaults_to_0_7() {
        let params = Parameters::new();
        assert_eq!(params.min_score(), 0.7);
    }

    #[test]
    fn min_score_reads_parameter() {
        let mut map = HashMap::new();
        map.insert("min-score".to_string(), ParameterValue::Str("0.5".into()));
        let params = Parameters(map);
        assert_eq!(params.min_score(), 0.5);
    }

    #[test]
    fn response_failure_sets_null_score_and_error_type() {
        let resp = EvaluationResponse::failure("ConfigurationError", "model.name missing");
        assert!(resp.score.is_none());
        assert!(!resp.passed);
        assert_eq!(
            resp.metadata.get("error_type").map(|s| s.as_str()),
            Some("ConfigurationError")
        );
    }
}
