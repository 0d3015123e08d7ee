//! Scoring Engine Adapter (C7, §4.6).
//!
//! Two backends, selected by the request's `provider` parameter:
//! LLM-as-judge (native prompt + structured-reply parsing) and a RAGAS-style
//! native-Rust per-metric scorer set. Both end up calling the same
//! [`ark_evaluator_llm::LlmTransport`] -- there is no foreign scoring
//! runtime to isolate from (§9 "Concurrency reset hack").

use std::collections::HashMap;

use ark_evaluator_llm::{ChatParams, LlmTransport, Result as TransportResult};
use ark_evaluator_types::{FieldValue, MetricKind, ModelConfig, Parameters, TokenUsage};

use crate::metrics::DatasetEntry;

/// The parsed reply from an LLM-as-judge call (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub score: f64,
    pub passed: Option<bool>,
    pub reasoning: String,
    pub criteria_scores: HashMap<String, f64>,
}

/// Build the judging prompt embedding role text, the query/response under
/// judgment, optional agent instructions and scope rules, optional golden
/// examples, optional retrieved context, and requested scope criteria
/// (§4.6 item 1).
#[allow(clippy::too_many_arguments)]
pub fn build_judge_prompt(
    query: &str,
    response: &str,
    agent_instructions: Option<&str>,
    scope_rules: &[String],
    golden_examples: &[(String, String)],
    context: &[String],
    criteria: &[String],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are an impartial evaluator judging the quality of an AI agent's response. \
         Score strictly and honestly.\n\n",
    );

    if let Some(instructions) = agent_instructions {
        prompt.push_str("Agent instructions:\n");
        prompt.push_str(instructions);
        prompt.push_str("\n\n");
    }

    if !scope_rules.is_empty() {
        prompt.push_str("Scope rules the response must respect:\n");
        for rule in scope_rules {
            prompt.push_str("- ");
            prompt.push_str(rule);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if !golden_examples.is_empty() {
        prompt.push_str("Reference examples of good responses:\n");
        for (input, output) in golden_examples {
            prompt.push_str(&format!("Q: {input}\nA: {output}\n\n"));
        }
    }

    if !context.is_empty() {
        prompt.push_str("Retrieved context:\n");
        for (i, passage) in context.iter().enumerate() {
            prompt.push_str(&format!("[{}] {passage}\n", i + 1));
        }
        prompt.push('\n');
    }

    if !criteria.is_empty() {
        prompt.push_str("Evaluation criteria: ");
        prompt.push_str(&criteria.join(", "));
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!("Query: {query}\n"));
    prompt.push_str(&format!("Response: {response}\n\n"));
    prompt.push_str(
        "Reply in exactly this format:\n\
         SCORE: <a number between 0 and 1>\n\
         PASSED: <true|false>\n\
         REASONING: <one or two sentences>\n\
         CRITERIA_SCORES: <comma-separated key=value pairs, optional>\n",
    );
    prompt
}

/// Parse a judge's structured reply (§4.6 item 1). Scores greater than 1
/// are interpreted as a 0-100 scale and rescaled.
pub fn parse_judge_reply(reply: &str) -> JudgeVerdict {
    let mut score = 0.0;
    let mut passed = None;
    let mut reasoning = String::new();
    let mut criteria_scores = HashMap::new();

    for line in reply.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("SCORE:") {
            if let Ok(mut parsed) = rest.trim().parse::<f64>() {
                if parsed > 1.0 {
                    parsed /= 100.0;
                }
                score = parsed.clamp(0.0, 1.0);
            }
        } else if let Some(rest) = line.strip_prefix("PASSED:") {
            passed = match rest.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            };
        } else if let Some(rest) = line.strip_prefix("REASONING:") {
            reasoning = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("CRITERIA_SCORES:") {
            for pair in rest.split(',') {
                if let Some((k, v)) = pair.split_once('=')
                    && let Ok(v) = v.trim().parse::<f64>()
                {
                    criteria_scores.insert(k.trim().to_string(), v);
                }
            }
        }
    }

    JudgeVerdict {
        score,
        passed,
        reasoning,
        criteria_scores,
    }
}

/// Whether `verdict` passes, applying the §4.6 default (`score >=
/// min_score`) unless the judge supplied an explicit `PASSED:`.
pub fn effective_passed(verdict: &JudgeVerdict, min_score: f64) -> bool {
    verdict.passed.unwrap_or(verdict.score >= min_score)
}

/// Invoke the LLM-as-judge path end to end: build the prompt, call the
/// transport, parse the structured reply.
#[allow(clippy::too_many_arguments)]
pub async fn judge(
    transport: &dyn LlmTransport,
    model: &ModelConfig,
    query: &str,
    response: &str,
    agent_instructions: Option<&str>,
    scope_rules: &[String],
    golden_examples: &[(String, String)],
    context: &[String],
    criteria: &[String],
) -> TransportResult<(JudgeVerdict, TokenUsage)> {
    let prompt = build_judge_prompt(
        query,
        response,
        agent_instructions,
        scope_rules,
        golden_examples,
        context,
        criteria,
    );
    let (reply, usage) = transport
        .chat_complete(&prompt, model, ChatParams::default())
        .await?;
    Ok((parse_judge_reply(&reply), usage))
}

/// Credential-prefix based provider detection for the RAGAS path (§4.6):
/// `azure.*`/`langfuse.azure_*` => azure, `openai.*` => openai, and so on.
pub fn detect_llm_provider(parameters: &Parameters) -> Option<&'static str> {
    const PREFIXES: &[(&str, &str)] = &[
        ("azure.", "azure"),
        ("langfuse.azure_", "azure"),
        ("openai.", "openai"),
        ("anthropic.", "anthropic"),
        ("google.", "google"),
        ("ollama.", "ollama"),
    ];
    PREFIXES
        .iter()
        .find(|(prefix, _)| parameters.has_prefix(prefix))
        .map(|(_, provider)| *provider)
}

/// The documented fallback score used when a RAGAS-style metric scorer
/// cannot produce a finite value (§4.6): no longer an FFI-NaN workaround,
/// just "no verdict, can't leave it undefined".
pub const NAN_FALLBACK_SCORE: f64 = 0.7;

fn field_text(entry: &DatasetEntry, key: &str) -> String {
    match entry.get(key) {
        Some(FieldValue::String(s)) => s.clone(),
        Some(FieldValue::ListString(items)) => items.join("\n"),
        _ => String::new(),
    }
}

fn field_list(entry: &DatasetEntry, key: &str) -> Vec<String> {
    match entry.get(key) {
        Some(FieldValue::ListString(items)) => items.clone(),
        Some(FieldValue::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Score one metric against a shaped dataset entry via the LLM-as-judge
/// machinery, tailoring the prompt to the fields that metric actually
/// declares (§4.6 "External engine boundary").
pub async fn score_ragas_metric(
    kind: MetricKind,
    entry: &DatasetEntry,
    transport: &dyn LlmTransport,
    model: &ModelConfig,
) -> TransportResult<(f64, String, TokenUsage)> {
    let query = field_text(entry, "user_input");
    let response = field_text(entry, "response");
    let reference = field_text(entry, "reference");
    let context = field_list(entry, "retrieved_contexts");

    let criteria_label = match kind {
        MetricKind::Relevance => "how relevant the response is to the query",
        MetricKind::Correctness => "factual correctness against the reference answer",
        MetricKind::Similarity => "semantic similarity to the reference answer",
        MetricKind::Faithfulness => "whether every claim is supported by the retrieved context",
        MetricKind::ContextPrecision => "whether the retrieved context is precisely targeted",
        MetricKind::ContextRecall => "whether the retrieved context covers the reference answer",
    };

    let golden_examples: Vec<(String, String)> = if reference.is_empty() {
        Vec::new()
    } else {
        vec![(query.clone(), reference.clone())]
    };

    let (verdict, usage) = judge(
        transport,
        model,
        &query,
        &response,
        None,
        &[],
        &golden_examples,
        &context,
        &[criteria_label.to_string()],
    )
    .await?;

    let score = if verdict.score.is_finite() {
        verdict.score
    } else {
        NAN_FALLBACK_SCORE
    };
    Ok((score, verdict.reasoning, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let reply = "SCORE: 0.9\nPASSED: true\nREASONING: Correct and complete.\nCRITERIA_SCORES: accuracy=0.9, tone=1.0";
        let verdict = parse_judge_reply(reply);
        assert_eq!(verdict.score, 0.9);
        assert_eq!(verdict.passed, Some(true));
        assert_eq!(verdict.reasoning, "Correct and complete.");
        assert_eq!(verdict.criteria_scores.get("accuracy"), Some(&0.9));
    }

    #[test]
    fn rescales_scores_over_one() {
        let verdict = parse_judge_reply("SCORE: 87\nREASONING: good");
        assert!((verdict.score - 0.87).abs() < 1e-9);
    }

    #[test]
    fn effective_passed_falls_back_to_min_score() {
        let verdict = JudgeVerdict {
            score: 0.8,
            passed: None,
            reasoning: String::new(),
            criteria_scores: HashMap::new(),
        };
        assert!(effective_passed(&verdict, 0.7));
        assert!(!effective_passed(&verdict, 0.9));
    }

    #[test]
    fn explicit_passed_overrides_min_score() {
        let verdict = JudgeVerdict {
            score: 0.2,
            passed: Some(true),
            reasoning: String::new(),
            criteria_scores: HashMap::new(),
        };
        assert!(effective_passed(&verdict, 0.9));
    }

    #[test]
    fn detects_azure_provider_from_prefix() {
        let mut map = HashMap::new();
        map.insert(
            "azure.endpoint".to_string(),
            ark_evaluator_types::ParameterValue::Str("https://x".into()),
        );
        let params = Parameters(map);
        assert_eq!(detect_llm_provider(&params), Some("azure"));
    }

    #[test]
    fn detects_no_provider_when_no_prefix_present() {
        let params = Parameters::new();
        assert_eq!(detect_llm_provider(&params), None);
    }
}
