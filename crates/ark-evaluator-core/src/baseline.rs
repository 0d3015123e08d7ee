//! Baseline Aggregator (C9, §4.8).
//!
//! Runs a golden-example suite through the transport + judge pipeline with
//! bounded concurrency, then aggregates overall and per-category/difficulty
//! results. The fan-out shape is grounded on the same
//! `Semaphore` + `buffer_unordered` pattern used for concurrent scenario
//! evaluation elsewhere in the example pack (the teacher itself has no
//! bounded-concurrency fan-out of its own to follow here).

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tokio::sync::Semaphore;
use tracing::warn;

use ark_evaluator_llm::{ChatParams, LlmTransport};
use ark_evaluator_types::{GoldenExample, ModelConfig, TokenUsage};

use crate::scoring;

/// Outcome of judging one golden example (§4.8).
#[derive(Debug, Clone)]
pub struct BaselineResult {
    pub score: f64,
    pub passed: bool,
    pub reasoning: String,
    pub token_usage: TokenUsage,
    pub error: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// The full aggregated baseline run (§4.8).
#[derive(Debug, Clone, Default)]
pub struct BaselineReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub average_score: f64,
    pub token_usage: TokenUsage,
    pub results: Vec<BaselineResult>,
}

impl BaselineReport {
    /// Flatten overall and per-category/difficulty sub-aggregates into the
    /// `map<string,string>` shape the HTTP facade returns (§4.8).
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("baseline.total".into(), self.total.to_string());
        metadata.insert("baseline.passed".into(), self.passed.to_string());
        metadata.insert("baseline.failed".into(), self.failed.to_string());
        metadata.insert(
            "baseline.pass_rate".into(),
            format!("{:.3}", self.pass_rate),
        );
        metadata.insert(
            "baseline.average_score".into(),
            format!("{:.3}", self.average_score),
        );

        for (key, group) in group_by(&self.results, |r| r.category.clone()) {
            insert_group(&mut metadata, "category", &key, &group);
        }
        for (key, group) in group_by(&self.results, |r| r.difficulty.clone()) {
            insert_group(&mut metadata, "difficulty", &key, &group);
        }
        metadata
    }
}

fn group_by(
    results: &[BaselineResult],
    key_fn: impl Fn(&BaselineResult) -> Option<String>,
) -> Vec<(String, Vec<&BaselineResult>)> {
    let mut groups: Vec<(String, Vec<&BaselineResult>)> = Vec::new();
    for result in results {
        let Some(key) = key_fn(result) else { continue };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(result),
            None => groups.push((key, vec![result])),
        }
    }
    groups
}

fn insert_group(metadata: &mut HashMap<String, String>, dimension: &str, key: &str, group: &[&BaselineResult]) {
    let count = group.len();
    let passed = group.iter().filter(|r| r.passed).count();
    let avg_score = if count == 0 {
        0.0
    } else {
        group.iter().map(|r| r.score).sum::<f64>() / count as f64
    };
    let pass_rate = if count == 0 { 0.0 } else { passed as f64 / count as f64 };

    metadata.insert(format!("{dimension}_{key}_count"), count.to_string());
    metadata.insert(format!("{dimension}_{key}_passed"), passed.to_string());
    metadata.insert(format!("{dimension}_{key}_avg_score"), format!("{avg_score:.3}"));
    metadata.insert(format!("{dimension}_{key}_pass_rate"), format!("{pass_rate:.3}"));
}

async fn evaluate_example(
    transport: &dyn LlmTransport,
    model: &ModelConfig,
    example: &GoldenExample,
) -> BaselineResult {
    let category = example.category.clone();
    let difficulty = example.difficulty.clone();

    let generated = transport
        .chat_complete(&example.input, model, ChatParams::default())
        .await;

    let (response, mut usage) = match generated {
        Ok((text, usage)) => (text, usage),
        Err(e) => {
            warn!(error = %e, input = %example.input, "baseline example generation failed");
            return BaselineResult {
                score: 0.0,
                passed: false,
                reasoning: String::new(),
                token_usage: TokenUsage::default(),
                error: Some(e.to_string()),
                category,
                difficulty,
            };
        }
    };

    match scoring::judge(
        transport,
        model,
        &example.input,
        &response,
        None,
        &[],
        &[(example.input.clone(), example.expected_output.clone())],
        &[],
        &[],
    )
    .await
    {
        Ok((verdict, judge_usage)) => {
            usage.add(&judge_usage);
            let min_score = example.expected_min_score.unwrap_or(0.7);
            BaselineResult {
                score: verdict.score,
                passed: scoring::effective_passed(&verdict, min_score),
                reasoning: verdict.reasoning,
                token_usage: usage,
                error: None,
                category,
                difficulty,
            }
        }
        Err(e) => {
            warn!(error = %e, input = %example.input, "baseline example judging failed");
            BaselineResult {
                score: 0.0,
                passed: false,
                reasoning: String::new(),
                token_usage: usage,
                error: Some(e.to_string()),
                category,
                difficulty,
            }
        }
    }
}

/// Run every golden example concurrently (bounded by `max_concurrency`,
/// §4.8), isolating per-example failures rather than aborting the run.
pub async fn run_baseline(
    transport: Arc<dyn LlmTransport>,
    model: ModelConfig,
    examples: Vec<GoldenExample>,
    max_concurrency: usize,
) -> BaselineReport {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let model = Arc::new(model);

    let tasks: Vec<_> = examples
        .into_iter()
        .map(|example| {
            let transport = transport.clone();
            let model = model.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                evaluate_example(transport.as_ref(), model.as_ref(), &example).await
            }
        })
        .collect();

    let total = tasks.len();
    let results: Vec<BaselineResult> = stream::iter(tasks)
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;
    let average_score = if total == 0 {
        0.0
    } else {
        results.iter().map(|r| r.score).sum::<f64>() / total as f64
    };
    let mut token_usage = TokenUsage::default();
    for r in &results {
        token_usage.add(&r.token_usage);
    }

    BaselineReport {
        total,
        passed,
        failed,
        pass_rate: if total == 0 { 0.0 } else { passed as f64 / total as f64 },
        average_score,
        token_usage,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64, passed: bool, category: Option<&str>, difficulty: Option<&str>) -> BaselineResult {
        BaselineResult {
            score,
            passed,
            reasoning: String::new(),
            token_usage: TokenUsage::default(),
            error: None,
            category: category.map(String::from),
            difficulty: difficulty.map(String::from),
        }
    }

    #[test]
    fn metadata_flattens_per_difficulty_aggregates() {
        let report = BaselineReport {
            total: 3,
            passed: 2,
            failed: 1,
            pass_rate: 2.0 / 3.0,
            average_score: 0.7,
            token_usage: TokenUsage::default(),
            results: vec![
                result(0.9, true, Some("math"), Some("easy")),
                result(0.8, true, Some("math"), Some("easy")),
                result(0.4, false, Some("math"), Some("hard")),
            ],
        };
        let metadata = report.to_metadata();
        assert_eq!(metadata.get("difficulty_hard_avg_score").unwrap(), "0.400");
        assert_eq!(metadata.get("difficulty_easy_passed").unwrap(), "2");
        assert_eq!(metadata.get("category_math_count").unwrap(), "3");
    }

    #[test]
    fn empty_result_set_produces_zeroed_aggregates() {
        let report = BaselineReport::default();
        assert_eq!(report.average_score, 0.0);
        assert!(report.to_metadata().contains_key("baseline.total"));
    }
}
