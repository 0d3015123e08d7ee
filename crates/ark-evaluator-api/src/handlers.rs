//! HTTP request handlers for the evaluation facade (C10, §4.9).

use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use ark_evaluator_core::k8s_client;
use ark_evaluator_core::metrics as metric_registry;
use ark_evaluator_types::{EvaluationRequest, EvaluationResponse, MetricDescriptor, MetricKind};

use crate::error::ApiError;
use crate::state::AppState;

/// Build all API routes, mirroring the endpoint table in §4.9.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/evaluate", post(evaluate))
        .route("/providers/{provider}/metrics", get(list_metrics))
        .route("/providers/{provider}/metrics/{metric}", get(get_metric))
        .route("/health", get(health))
        .route("/ready", get(ready))
}

async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let ctx = state.provider_context().await;
    let response = ark_evaluator_core::dispatch(&request, &ctx).await?;
    Ok(Json(response))
}

/// `GET /providers/{provider}/metrics` -- lists descriptors for every
/// metric the registry knows (the registry is provider-agnostic; the
/// path segment exists to mirror the dispatcher's provider-scoped
/// namespace, but a `ragas`/`langfuse-trace` request both see the same
/// closed metric set, §4.5).
async fn list_metrics(
    Path(provider): Path<String>,
) -> Result<Json<Vec<MetricDescriptor>>, ApiError> {
    validate_oss_provider(&provider)?;
    let descriptors = metric_registry::all_kinds()
        .iter()
        .map(|kind| metric_registry::descriptor(*kind))
        .collect();
    Ok(Json(descriptors))
}

async fn get_metric(
    Path((provider, metric)): Path<(String, String)>,
) -> Result<Json<MetricDescriptor>, ApiError> {
    validate_oss_provider(&provider)?;
    let kind = MetricKind::from_name(&metric)
        .ok_or_else(|| ApiError::not_found(format!("unknown metric '{metric}'")))?;
    Ok(Json(metric_registry::descriptor(kind)))
}

fn validate_oss_provider(provider: &str) -> Result<(), ApiError> {
    match provider {
        "ragas" | "langfuse-trace" | "langfuse" => Ok(()),
        other => Err(ApiError::not_found(format!(
            "unknown provider '{other}', expected one of: ragas, langfuse-trace"
        ))),
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// `GET /health` -- liveness only: the process is up (§4.9).
async fn health() -> Json<HealthBody> {
    let start = START_TIME.get_or_init(Instant::now);
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: start.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct ReadyBody {
    ready: bool,
    kubernetes_initialized: bool,
}

/// `GET /ready` -- additionally reports whether the Kubernetes client's
/// lazy one-shot initialization has been attempted. Readiness does not
/// require that attempt to have succeeded: a process running in
/// "no-Kubernetes" mode is still ready (§4.9).
async fn ready() -> Json<ReadyBody> {
    Json(ReadyBody {
        ready: true,
        kubernetes_initialized: k8s_client::initialization_attempted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_oss_provider_accepts_known_names() {
        assert!(validate_oss_provider("ragas").is_ok());
        assert!(validate_oss_provider("langfuse-trace").is_ok());
        assert!(validate_oss_provider("bogus").is_err());
    }
}
