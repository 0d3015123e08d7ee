//! Resource Resolver (C1, §4.1).
//!
//! Resolves `Model`, `Agent`, and `Query` custom resources and dereferences
//! `valueFrom` secret/configmap references. Every entity it produces is
//! request-scoped and immutable after construction (§3).

use std::collections::HashMap;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use tracing::warn;

use ark_evaluator_types::{ModelConfig, ValueFrom, ValueSource};

use crate::config::KubeClientMode;
use crate::crd::{Agent, Model, ModelType, Query};
use crate::error::ResolverError;
use crate::k8s_client;

/// `AgentInstructions` (§3): scope hints are derived heuristically from the
/// prompt text.
#[derive(Debug, Clone, Default)]
pub struct AgentInstructions {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub scope_hints: Vec<String>,
}

const SCOPE_HINT_MARKERS: &[(&str, &str)] = &[
    ("only answer questions about", "should-refuse-non-scope"),
    ("do not answer", "should-refuse-non-scope"),
    ("java 8", "java8-specific"),
    ("java8", "java8-specific"),
    ("python 2", "python2-specific"),
];

fn derive_scope_hints(prompt: &str) -> Vec<String> {
    let lower = prompt.to_ascii_lowercase();
    SCOPE_HINT_MARKERS
        .iter()
        .filter(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| hint.to_string())
        .collect()
}

/// Flattened metrics extracted from a resolved `Query`'s status (§3
/// "Duration (extended)" / SPEC_FULL extension, grounded on
/// `original_source/.../metrics/query_resolver.py`).
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub token_efficiency: f64,
    pub tokens_per_character: f64,
    pub execution_duration_seconds: f64,
    pub tokens_per_second: f64,
    pub response_count: usize,
    pub total_response_length: usize,
    pub average_response_length: f64,
    pub max_response_length: usize,
    pub min_response_length: usize,
    pub response_completeness: f64,
    pub query_phase: String,
    pub is_completed: bool,
    pub has_errors: bool,
    pub error_message: Option<String>,
}

impl QueryMetrics {
    /// Flatten into the `metadata` string map shape used across the HTTP
    /// surface.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("query.total_tokens".into(), self.total_tokens.to_string());
        m.insert(
            "query.token_efficiency".into(),
            format!("{:.4}", self.token_efficiency),
        );
        m.insert(
            "query.execution_duration_seconds".into(),
            format!("{:.3}", self.execution_duration_seconds),
        );
        m.insert(
            "query.tokens_per_second".into(),
            format!("{:.3}", self.tokens_per_second),
        );
        m.insert(
            "query.response_count".into(),
            self.response_count.to_string(),
        );
        m.insert(
            "query.average_response_length".into(),
            format!("{:.1}", self.average_response_length),
        );
        m.insert(
            "query.response_completeness".into(),
            format!("{:.3}", self.response_completeness),
        );
        m.insert("query.phase".into(), self.query_phase.clone());
        m.insert("query.is_completed".into(), self.is_completed.to_string());
        m.insert("query.has_errors".into(), self.has_errors.to_string());
        if let Some(err) = &self.error_message {
            m.insert("query.error_message".into(), err.clone());
        }
        m
    }
}

/// A resolved model plus any observability markers produced while
/// resolving it (fallback usage, per-field dereference errors, §4.1).
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub config: ModelConfig,
    pub metadata: HashMap<String, String>,
}

pub struct ResourceResolver {
    client: Option<kube::Client>,
    default_namespace: String,
}

impl ResourceResolver {
    pub async fn new(mode: KubeClientMode, default_namespace: impl Into<String>) -> Self {
        ResourceResolver {
            client: k8s_client::client(mode).await,
            default_namespace: default_namespace.into(),
        }
    }

    #[cfg(test)]
    pub fn with_client(client: Option<kube::Client>, default_namespace: impl Into<String>) -> Self {
        ResourceResolver {
            client,
            default_namespace: default_namespace.into(),
        }
    }

    pub fn is_kubernetes_available(&self) -> bool {
        self.client.is_some()
    }

    /// Resolve a single `{value}` / `{valueFrom}` field (§4.1, §9).
    /// `value` wins when both are present (§8 invariant). When neither is
    /// present, the documented marker string is returned as a normal
    /// success value, not an error.
    pub async fn resolve_value_source(
        &self,
        source: &ValueSource,
        namespace: &str,
    ) -> Result<String, ResolverError> {
        if let Some(v) = &source.value {
            return Ok(v.clone());
        }
        match &source.value_from {
            Some(ValueFrom::SecretKeyRef(r)) => {
                let Some(client) = &self.client else {
                    return Err(ResolverError::NotFound {
                        kind: "Secret".into(),
                        name: r.name.clone(),
                        namespace: namespace.to_string(),
                    });
                };
                let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
                match api.get(&r.name).await {
                    Ok(secret) => {
                        let data = secret.data.unwrap_or_default();
                        match data.get(&r.key) {
                            Some(bytes) => Ok(String::from_utf8_lossy(&bytes.0).to_string()),
                            None => Err(ResolverError::SecretKeyNotFound {
                                name: r.name.clone(),
                                key: r.key.clone(),
                            }),
                        }
                    }
                    Err(kube::Error::Api(ae)) if ae.code == 404 => {
                        Err(ResolverError::SecretKeyNotFound {
                            name: r.name.clone(),
                            key: r.key.clone(),
                        })
                    }
                    Err(kube::Error::Api(ae)) if ae.code == 403 => {
                        Err(ResolverError::Forbidden {
                            kind: "Secret".into(),
                            name: r.name.clone(),
                        })
                    }
                    Err(e) => Err(ResolverError::Kube(e)),
                }
            }
            Some(ValueFrom::ConfigMapKeyRef(r)) => {
                let Some(client) = &self.client else {
                    return Err(ResolverError::NotFound {
                        kind: "ConfigMap".into(),
                        name: r.name.clone(),
                        namespace: namespace.to_string(),
                    });
                };
                let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
                match api.get(&r.name).await {
                    Ok(cm) => {
                        let data = cm.data.unwrap_or_default();
                        match data.get(&r.key) {
                            Some(v) => Ok(v.clone()),
                            None => Err(ResolverError::ConfigMapKeyNotFound {
                                name: r.name.clone(),
                                key: r.key.clone(),
                            }),
                        }
                    }
                    Err(kube::Error::Api(ae)) if ae.code == 404 => {
                        Err(ResolverError::ConfigMapKeyNotFound {
                            name: r.name.clone(),
                            key: r.key.clone(),
                        })
                    }
                    Err(kube::Error::Api(ae)) if ae.code == 403 => {
                        Err(ResolverError::ConfigMapAccessDenied { name: r.name.clone() })
                    }
                    Err(e) => Err(ResolverError::Kube(e)),
                }
            }
            None => Ok(ResolverError::EmptyValueSource.marker()),
        }
    }

    /// Resolve a field, recording a marker into `metadata` (instead of
    /// propagating a hard error) when dereference fails -- so the caller
    /// can still produce a meaningful verdict (§7 propagation policy).
    async fn resolve_field(
        &self,
        source: &ValueSource,
        namespace: &str,
        metadata_key: &str,
        metadata: &mut HashMap<String, String>,
    ) -> String {
        match self.resolve_value_source(source, namespace).await {
            Ok(v) => v,
            Err(e) => {
                let marker = e.marker();
                warn!(field = metadata_key, error = %e, "value source dereference failed");
                metadata.insert(format!("{metadata_key}.error"), marker.clone());
                marker
            }
        }
    }

    async fn build_model_config(
        &self,
        spec: &crate::crd::ModelSpec,
        namespace: &str,
    ) -> ResolvedModel {
        let mut metadata = HashMap::new();
        let model_name = self
            .resolve_field(&spec.model, namespace, "model.model", &mut metadata)
            .await;

        let provider_cfg = spec.config.for_type(spec.model_type).cloned().unwrap_or_default();

        let base_url = match &provider_cfg.base_url {
            Some(src) => {
                self.resolve_field(src, namespace, "model.baseUrl", &mut metadata)
                    .await
            }
            None => default_base_url(spec.model_type),
        };
        let api_key = match &provider_cfg.api_key {
            Some(src) => {
                self.resolve_field(src, namespace, "model.apiKey", &mut metadata)
                    .await
            }
            None => ResolverError::EmptyValueSource.marker(),
        };
        let api_version = match &provider_cfg.api_version {
            Some(src) => Some(
                self.resolve_field(src, namespace, "model.apiVersion", &mut metadata)
                    .await,
            ),
            None => None,
        };

        ResolvedModel {
            config: ModelConfig {
                model: model_name,
                base_url,
                api_key,
                api_version,
            },
            metadata,
        }
    }

    /// Resolve the model to use for a request (§4.1 resolution order):
    /// (1) explicit `modelRef`; (2) `queryContext.spec.modelRef`; (3) the
    /// namespace-default `Model` named `"default"`; (4) the process-level
    /// fallback, tagged observably (§9 open question resolution).
    pub async fn resolve_model(
        &self,
        explicit_name: Option<&str>,
        explicit_namespace: Option<&str>,
        query_ctx: Option<&Query>,
    ) -> Result<ResolvedModel, ResolverError> {
        let Some(client) = self.client.clone() else {
            let mut metadata = HashMap::new();
            metadata.insert("resolver.fallback".into(), "true".into());
            metadata.insert(
                "resolver.fallback_reason".into(),
                "no-kubernetes-mode".into(),
            );
            return Ok(ResolvedModel {
                config: ModelConfig::fallback(),
                metadata,
            });
        };

        let (name, namespace) = if let Some(name) = explicit_name {
            (
                name.to_string(),
                explicit_namespace
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_namespace.clone()),
            )
        } else if let Some(model_ref) = query_ctx.and_then(|q| q.spec.model_ref.as_ref()) {
            (
                model_ref.name.clone(),
                model_ref
                    .namespace
                    .clone()
                    .unwrap_or_else(|| self.default_namespace.clone()),
            )
        } else {
            ("default".to_string(), self.default_namespace.clone())
        };

        let api: Api<Model> = Api::namespaced(client, &namespace);
        match api.get(&name).await {
            Ok(model) => Ok(self.build_model_config(&model.spec, &namespace).await),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let mut metadata = HashMap::new();
                metadata.insert("resolver.fallback".into(), "true".into());
                metadata.insert(
                    "resolver.fallback_reason".into(),
                    format!("model '{name}' not found in namespace '{namespace}'"),
                );
                Ok(ResolvedModel {
                    config: ModelConfig::fallback(),
                    metadata,
                })
            }
            Err(kube::Error::Api(ae)) if ae.code == 403 => Err(ResolverError::Forbidden {
                kind: "Model".into(),
                name,
            }),
            Err(e) => Err(ResolverError::Kube(e)),
        }
    }

    pub async fn resolve_agent(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<AgentInstructions>, ResolverError> {
        let Some(client) = self.client.clone() else {
            return Ok(None);
        };
        let api: Api<Agent> = Api::namespaced(client, namespace);
        match api.get(name).await {
            Ok(agent) => Ok(Some(AgentInstructions {
                name: name.to_string(),
                description: agent.spec.description.clone(),
                system_prompt: agent.spec.prompt.clone(),
                scope_hints: derive_scope_hints(&agent.spec.prompt),
            })),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(kube::Error::Api(ae)) if ae.code == 403 => Err(ResolverError::Forbidden {
                kind: "Agent".into(),
                name: name.to_string(),
            }),
            Err(e) => Err(ResolverError::Kube(e)),
        }
    }

    pub async fn resolve_query(&self, name: &str, namespace: &str) -> Result<Query, ResolverError> {
        let Some(client) = self.client.clone() else {
            return Err(ResolverError::NotFound {
                kind: "Query".into(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        };
        let api: Api<Query> = Api::namespaced(client, namespace);
        match api.get(name).await {
            Ok(query) => Ok(query),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(ResolverError::NotFound {
                kind: "Query".into(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(kube::Error::Api(ae)) if ae.code == 403 => Err(ResolverError::Forbidden {
                kind: "Query".into(),
                name: name.to_string(),
            }),
            Err(e) => Err(ResolverError::Kube(e)),
        }
    }

    /// Extract a flattened metrics view from a resolved `Query`'s status
    /// (SPEC_FULL extension grounded on
    /// `original_source/.../metrics/query_resolver.py`).
    pub fn extract_query_metrics(query: &Query) -> QueryMetrics {
        let Some(status) = &query.status else {
            return QueryMetrics::default();
        };

        let token_usage = status.token_usage.unwrap_or_default();
        let duration_seconds = status
            .duration
            .as_ref()
            .map(|d| d.to_seconds())
            .unwrap_or(0.0);

        let lengths: Vec<usize> = status
            .responses
            .iter()
            .map(|r| r.content.chars().count())
            .collect();
        let total_response_length: usize = lengths.iter().sum();
        let response_count = lengths.len();
        let average_response_length = if response_count > 0 {
            total_response_length as f64 / response_count as f64
        } else {
            0.0
        };
        let max_response_length = lengths.iter().copied().max().unwrap_or(0);
        let min_response_length = lengths.iter().copied().min().unwrap_or(0);

        let token_efficiency = if token_usage.prompt_tokens > 0 {
            token_usage.completion_tokens as f64 / token_usage.prompt_tokens as f64
        } else {
            0.0
        };
        let tokens_per_character = if total_response_length > 0 {
            token_usage.total_tokens as f64 / total_response_length as f64
        } else {
            0.0
        };
        let tokens_per_second = if duration_seconds > 0.0 {
            token_usage.total_tokens as f64 / duration_seconds
        } else {
            0.0
        };

        let phase = status.phase.clone().unwrap_or_default();
        let is_completed = phase.eq_ignore_ascii_case("done") || phase.eq_ignore_ascii_case("complete");
        let has_errors = phase.eq_ignore_ascii_case("error") || phase.eq_ignore_ascii_case("failed");

        QueryMetrics {
            total_tokens: token_usage.total_tokens,
            prompt_tokens: token_usage.prompt_tokens,
            completion_tokens: token_usage.completion_tokens,
            token_efficiency,
            tokens_per_character,
            execution_duration_seconds: duration_seconds,
            tokens_per_second,
            response_count,
            total_response_length,
            average_response_length,
            max_response_length,
            min_response_length,
            response_completeness: (total_response_length as f64 / 50.0).min(1.0),
            query_phase: phase,
            is_completed,
            has_errors,
            error_message: if has_errors {
                Some("query phase reported an error".to_string())
            } else {
                None
            },
        }
    }
}

fn default_base_url(model_type: ModelType) -> String {
    match model_type {
        ModelType::Openai => "https://api.openai.com/v1".to_string(),
        ModelType::Azure => String::new(),
        ModelType::Bedrock => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::QuerySpec;

    #[tokio::test]
    async fn no_kubernetes_mode_returns_tagged_fallback() {
        let resolver = ResourceResolver::with_client(None, "default");
        let resolved = resolver.resolve_model(None, None, None).await.unwrap();
        assert_eq!(
            resolved.metadata.get("resolver.fallback").map(String::as_str),
            Some("true")
        );
        assert_eq!(resolved.config.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn value_wins_over_value_from_when_both_present() {
        let resolver = ResourceResolver::with_client(None, "default");
        let source = ValueSource {
            value: Some("literal-value".to_string()),
            value_from: Some(ValueFrom::SecretKeyRef(ark_evaluator_types::KeyRef {
                name: "s".into(),
                key: "k".into(),
            })),
        };
        let resolved = resolver.resolve_value_source(&source, "default").await.unwrap();
        assert_eq!(resolved, "literal-value");
    }

    #[tokio::test]
    async fn empty_value_source_returns_documented_marker() {
        let resolver = ResourceResolver::with_client(None, "default");
        let resolved = resolver
            .resolve_value_source(&ValueSource::default(), "default")
            .await
            .unwrap();
        assert_eq!(resolved, "<empty-value-source>");
    }

    #[test]
    fn derives_scope_hints_from_prompt_text() {
        let hints = derive_scope_hints("You should only answer questions about billing.");
        assert!(hints.contains(&"should-refuse-non-scope".to_string()));
    }

    #[test]
    fn query_metrics_default_for_missing_status() {
        let query = Query::new("q1", QuerySpec::default());
        let metrics = ResourceResolver::extract_query_metrics(&query);
        assert_eq!(metrics.total_tokens, 0);
        assert_eq!(metrics.response_count, 0);
    }
}
