//! Provider Registry & Dispatcher (C8, §4.7).
//!
//! The provider set is closed and known at compile time, so registration is
//! a tagged enum (`ProviderKind`) rather than a dynamic
//! `HashMap<String, Box<dyn Provider>>` registry (§9 "Provider
//! polymorphism").

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use ark_evaluator_llm::LlmTransport;
use ark_evaluator_types::{
    EvaluationConfig, EvaluationRequest, EvaluationResponse, GoldenExample, RequestType, Scope, TokenUsage,
};

use crate::baseline;
use crate::config::KubeClientMode;
use crate::error::ProviderDispatchError;
use crate::event_analyzer::EventAnalyzer;
use crate::expr;
use crate::metrics::{self, DatasetInputs};
use crate::resolver::ResourceResolver;
use crate::scoring;
use crate::trace::{EvaluationTrace, TraceSink};

/// Everything a provider needs to execute a request, shared across the
/// request's lifetime (§5 "Shared resources" -- providers themselves are
/// stateless).
pub struct ProviderContext {
    pub resolver: ResourceResolver,
    pub transport: Arc<dyn LlmTransport>,
    pub trace_sink: Arc<dyn TraceSink>,
    pub kube_client_mode: KubeClientMode,
    pub default_namespace: String,
    pub baseline_concurrency: usize,
}

/// Closed native set plus the open OSS set, chosen by `parameters.provider`
/// (§4.7). `"ark"`/`"default"` select a native provider by request
/// `type`; anything else selects an OSS provider by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Direct,
    Query,
    Baseline,
    Batch,
    Event,
    Ragas,
    LangfuseTrace,
}

const NATIVE_PROVIDERS: &[&str] = &["ark", "default"];
const OSS_PROVIDERS: &[&str] = &["ragas", "langfuse-trace", "langfuse"];

impl ProviderKind {
    pub fn resolve(provider: &str, request_type: RequestType) -> Result<Self, ProviderDispatchError> {
        if NATIVE_PROVIDERS.contains(&provider) {
            return Ok(match request_type {
                RequestType::Direct => ProviderKind::Direct,
                RequestType::Query => ProviderKind::Query,
                RequestType::Baseline => ProviderKind::Baseline,
                RequestType::Batch => ProviderKind::Batch,
                RequestType::Event => ProviderKind::Event,
            });
        }
        match provider {
            "ragas" => Ok(ProviderKind::Ragas),
            "langfuse-trace" | "langfuse" => Ok(ProviderKind::LangfuseTrace),
            other => Err(ProviderDispatchError::UnknownProvider {
                requested: other.to_string(),
                available: NATIVE_PROVIDERS
                    .iter()
                    .chain(OSS_PROVIDERS.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

fn score_string(score: f64) -> String {
    format!("{score:.3}")
}

/// Top-level entry point: resolve the provider, then dispatch (§4.7).
/// `batch` recurses back into this function for each referenced
/// evaluation.
pub async fn dispatch(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let provider = request.parameters.provider();
    let kind = ProviderKind::resolve(&provider, request.request_type)?;

    info!(
        evaluator_name = %request.evaluator_name,
        provider = %provider,
        request_type = %request.request_type,
        "dispatching evaluation"
    );

    match kind {
        ProviderKind::Direct => dispatch_direct(request, ctx).await,
        ProviderKind::Query => dispatch_query(request, ctx).await,
        ProviderKind::Baseline => dispatch_baseline(request, ctx).await,
        ProviderKind::Batch => dispatch_batch(request, ctx).await,
        ProviderKind::Event => dispatch_event(request, ctx).await,
        ProviderKind::Ragas => dispatch_ragas(request, ctx).await,
        ProviderKind::LangfuseTrace => dispatch_langfuse_trace(request, ctx).await,
    }
}

async fn resolve_model_for_request(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<crate::resolver::ResolvedModel, ProviderDispatchError> {
    let name = request.parameters.get_str("model.name");
    let namespace = request.parameters.get_str("model.namespace");
    Ok(ctx.resolver.resolve_model(name, namespace, None).await?)
}

async fn dispatch_direct(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let EvaluationConfig::Direct { input, output } = &request.config else {
        return Err(ProviderDispatchError::MissingParameter("config.input/output".into()));
    };

    let resolved = resolve_model_for_request(request, ctx).await?;
    let min_score = request.parameters.min_score();

    let (verdict, usage) = scoring::judge(
        ctx.transport.as_ref(),
        &resolved.config,
        input,
        output,
        None,
        &[],
        &[],
        &[],
        &request.parameters.get_list("evaluation_criteria").unwrap_or_default(),
    )
    .await?;

    let mut metadata = resolved.metadata;
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());

    Ok(EvaluationResponse {
        score: Some(score_string(verdict.score)),
        passed: scoring::effective_passed(&verdict, min_score),
        metadata,
        token_usage: usage,
        error: None,
    })
}

async fn dispatch_query(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let EvaluationConfig::Query { query_ref } = &request.config else {
        return Err(ProviderDispatchError::MissingParameter("config.queryRef".into()));
    };

    let namespace = query_ref
        .namespace
        .clone()
        .unwrap_or_else(|| ctx.default_namespace.clone());
    let query = ctx.resolver.resolve_query(&query_ref.name, &namespace).await?;

    let content = select_response_target(&query.status, query_ref.response_target.as_deref());

    let resolved = resolve_model_for_request(request, ctx).await?;
    let min_score = request.parameters.min_score();

    let (verdict, usage) = scoring::judge(
        ctx.transport.as_ref(),
        &resolved.config,
        &query.spec.input,
        &content,
        None,
        &[],
        &[],
        &[],
        &[],
    )
    .await?;

    let mut metadata = resolved.metadata;
    metadata.extend(ResourceResolver::extract_query_metrics(&query).to_metadata());
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());

    Ok(EvaluationResponse {
        score: Some(score_string(verdict.score)),
        passed: scoring::effective_passed(&verdict, min_score),
        metadata,
        token_usage: usage,
        error: None,
    })
}

/// Pick the response whose target matches `responseTarget` (a bare `name`
/// or a `type:name` compound, §4.7). Missing target ⇒ empty string rather
/// than failing the evaluation.
fn select_response_target(status: &crate::crd::QueryStatus, response_target: Option<&str>) -> String {
    let Some(selector) = response_target else {
        return status.responses.first().map(|r| r.content.clone()).unwrap_or_default();
    };

    let (want_type, want_name) = match selector.split_once(':') {
        Some((t, n)) => (Some(t), n),
        None => (None, selector),
    };

    status
        .responses
        .iter()
        .find(|r| {
            r.target.name == want_name && want_type.is_none_or(|t| r.target.target_type == t)
        })
        .map(|r| r.content.clone())
        .unwrap_or_default()
}

async fn dispatch_baseline(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let examples: Vec<GoldenExample> = match request.parameters.get_str("golden-examples") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ProviderDispatchError::MissingParameter("golden-examples".into()))?,
        None => {
            return Err(ProviderDispatchError::MissingParameter("golden-examples".into()));
        }
    };

    let resolved = resolve_model_for_request(request, ctx).await?;
    let min_score = request.parameters.min_score();

    let report = baseline::run_baseline(
        ctx.transport.clone(),
        resolved.config,
        examples,
        ctx.baseline_concurrency,
    )
    .await;

    let mut metadata = resolved.metadata;
    metadata.extend(report.to_metadata());
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());

    Ok(EvaluationResponse {
        score: Some(score_string(report.average_score)),
        passed: report.average_score >= min_score,
        metadata,
        token_usage: report.token_usage,
        error: None,
    })
}

/// Recurse back into the dispatcher for each referenced evaluation. A
/// referenced evaluation that itself fails is recorded with `score=null`
/// and excluded from the average rather than aborting the batch (§4.7,
/// supplemented from the original batch-evaluation behavior).
async fn dispatch_batch(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let EvaluationConfig::Batch { evaluations } = &request.config else {
        return Err(ProviderDispatchError::MissingParameter("config.evaluations".into()));
    };

    let mut sub_results = Vec::with_capacity(evaluations.len());
    for sub_request in evaluations {
        match Box::pin(dispatch(sub_request, ctx)).await {
            Ok(response) => sub_results.push(response),
            Err(e) => {
                warn!(error = %e, "batch sub-evaluation failed");
                sub_results.push(EvaluationResponse::failure(e.error_type(), e.to_string()));
            }
        }
    }

    let all_passed = sub_results.iter().all(|r| r.passed);
    let scored: Vec<f64> = sub_results.iter().filter_map(|r| r.score_value()).collect();
    let average_score = if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    };

    let mut token_usage = TokenUsage::default();
    for r in &sub_results {
        token_usage.add(&r.token_usage);
    }

    let mut metadata = HashMap::new();
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());
    metadata.insert("batch.total".into(), sub_results.len().to_string());
    metadata.insert(
        "batch.scored".into(),
        scored.len().to_string(),
    );

    Ok(EvaluationResponse {
        score: average_score.map(score_string),
        passed: all_passed,
        metadata,
        token_usage,
        error: None,
    })
}

async fn dispatch_event(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let EvaluationConfig::Event { rules } = &request.config else {
        return Err(ProviderDispatchError::MissingParameter("config.rules".into()));
    };

    let query_name = request.parameters.get_str("query.name").map(str::to_string);
    let namespace = request
        .parameters
        .get_str("query.namespace")
        .unwrap_or(&ctx.default_namespace)
        .to_string();
    let session_id = request.parameters.get_str("sessionId").map(str::to_string);

    let analyzer = EventAnalyzer::new(ctx.kube_client_mode, namespace, query_name, session_id).await;
    let events = analyzer.get_events(Scope::Current, None, None).await?;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut metadata = HashMap::new();

    for rule in rules {
        let result = match expr::evaluate_rule(&rule.expression, &events) {
            Ok(result) => result,
            Err(e) => {
                warn!(rule = %rule.name, error = %e, "event rule evaluation failed, contributing 0");
                false
            }
        };
        metadata.insert(format!("rule.{}.result", rule.name), result.to_string());
        weighted_sum += rule.weight * if result { 1.0 } else { 0.0 };
        weight_total += rule.weight;
    }

    let score = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };
    let min_score = request.parameters.min_score();
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());
    metadata.insert("event.rule_count".into(), rules.len().to_string());

    Ok(EvaluationResponse {
        score: Some(score_string(score)),
        passed: score >= min_score,
        metadata,
        token_usage: TokenUsage::default(),
        error: None,
    })
}

async fn dispatch_ragas(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let requested_metrics = request
        .parameters
        .get_list("evaluation_criteria")
        .unwrap_or_default();
    if requested_metrics.is_empty() {
        return Err(ProviderDispatchError::MissingParameter("evaluation_criteria".into()));
    }

    let (input, output) = match &request.config {
        EvaluationConfig::Direct { input, output } => (input.clone(), output.clone()),
        _ => {
            return Err(ProviderDispatchError::MissingParameter("config.input/output".into()));
        }
    };
    let context = request.parameters.get_list("context");
    let ground_truth = request.parameters.get_str("ground_truth").map(str::to_string);

    let kinds: Vec<_> = requested_metrics
        .iter()
        .filter_map(|name| ark_evaluator_types::MetricKind::from_name(name))
        .collect();
    let entry = metrics::prepare_dataset_for_metrics(
        &kinds,
        &DatasetInputs {
            input: Some(input),
            output: Some(output),
            context,
            ground_truth,
        },
    );
    let partitioned = metrics::partition_requested_metrics(&requested_metrics, &entry);

    if partitioned.valid.is_empty() {
        return Err(ProviderDispatchError::Metric(crate::error::MetricError::NoValidMetrics));
    }

    let resolved = resolve_model_for_request(request, ctx).await?;
    let mut metric_scores = HashMap::new();
    let mut total_usage = TokenUsage::default();
    let mut scores = Vec::new();

    for kind in &partitioned.valid {
        let (score, _reasoning, usage) =
            scoring::score_ragas_metric(*kind, &entry, ctx.transport.as_ref(), &resolved.config).await?;
        metric_scores.insert(kind.canonical_name().to_string(), score_string(score));
        scores.push(score);
        total_usage.add(&usage);
    }

    let overall = scores.iter().sum::<f64>() / scores.len() as f64;
    let min_score = request.parameters.min_score();

    let mut metadata = resolved.metadata;
    for (k, v) in metric_scores {
        metadata.insert(format!("metric_scores.{k}"), v);
    }
    if !partitioned.invalid.is_empty() {
        metadata.insert(
            "invalid_metrics".into(),
            partitioned.invalid.join(","),
        );
        for (metric, err) in &partitioned.validation_errors {
            metadata.insert(format!("validation_errors.{metric}"), err.clone());
        }
    }
    metadata.insert(
        "valid_metrics".into(),
        partitioned
            .valid
            .iter()
            .map(|k| k.canonical_name())
            .collect::<Vec<_>>()
            .join(","),
    );
    metadata.insert("evaluator_name".into(), request.evaluator_name.clone());

    Ok(EvaluationResponse {
        score: Some(score_string(overall)),
        passed: overall >= min_score,
        metadata,
        token_usage: total_usage,
        error: None,
    })
}

async fn dispatch_langfuse_trace(
    request: &EvaluationRequest,
    ctx: &ProviderContext,
) -> Result<EvaluationResponse, ProviderDispatchError> {
    let response = dispatch_ragas(request, ctx).await?;

    ctx.trace_sink.record(EvaluationTrace {
        evaluator_name: request.evaluator_name.clone(),
        provider: "langfuse-trace".into(),
        input: String::new(),
        output: String::new(),
        score: response.score_value(),
        passed: response.passed,
        token_usage: response.token_usage,
    });

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_resolves_native_by_request_type() {
        assert_eq!(
            ProviderKind::resolve("ark", RequestType::Direct).unwrap(),
            ProviderKind::Direct
        );
        assert_eq!(
            ProviderKind::resolve("default", RequestType::Event).unwrap(),
            ProviderKind::Event
        );
    }

    #[test]
    fn provider_kind_resolves_oss_by_name() {
        assert_eq!(
            ProviderKind::resolve("ragas", RequestType::Direct).unwrap(),
            ProviderKind::Ragas
        );
        assert_eq!(
            ProviderKind::resolve("langfuse-trace", RequestType::Direct).unwrap(),
            ProviderKind::LangfuseTrace
        );
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(ProviderKind::resolve("bogus", RequestType::Direct).is_err());
    }
}
