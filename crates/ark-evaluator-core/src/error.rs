//! Typed error enums for the core evaluation engine.
//!
//! Each subsystem owns its own `thiserror`-derived enum (§10 "Error
//! handling") rather than sharing one crate-wide type, mirroring how the
//! teacher stack keeps `ProviderError` and `ServiceError` separate. The
//! HTTP facade (`ark-evaluator-api`) is the single place these get folded
//! into an outbound status code.

use thiserror::Error;

/// Resource resolution failures (C1, §4.1, §7).
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("resource not found: {kind} '{name}' in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("forbidden: RBAC denied read access to {kind} '{name}'")]
    Forbidden { kind: String, name: String },

    #[error("secret '{name}' key '{key}' not found")]
    SecretKeyNotFound { name: String, key: String },

    #[error("configmap '{name}' key '{key}' not found")]
    ConfigMapKeyNotFound { name: String, key: String },

    #[error("configmap '{name}' access denied")]
    ConfigMapAccessDenied { name: String },

    #[error("value source has neither `value` nor `valueFrom`")]
    EmptyValueSource,

    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverError {
    /// The observable marker string surfaced as evaluation metadata (§4.1):
    /// misconfiguration must be visible, never silently turned into an
    /// empty string.
    pub fn marker(&self) -> String {
        match self {
            ResolverError::NotFound { kind, name, .. } => {
                format!("<{}-not-found:{name}>", kind.to_ascii_lowercase())
            }
            ResolverError::Forbidden { kind, name } => {
                format!("<{}-access-denied:{name}>", kind.to_ascii_lowercase())
            }
            ResolverError::SecretKeyNotFound { name, key } => {
                format!("<secret-not-found:{name}/{key}>")
            }
            ResolverError::ConfigMapKeyNotFound { name, key } => {
                format!("<configmap-key-not-found:{name}/{key}>")
            }
            ResolverError::ConfigMapAccessDenied { name } => {
                format!("<configmap-access-denied:{name}>")
            }
            ResolverError::EmptyValueSource => "<empty-value-source>".to_string(),
            ResolverError::Kube(e) => format!("<kube-error:{e}>"),
            ResolverError::Json(e) => format!("<json-error:{e}>"),
        }
    }
}

/// Expression-evaluator failures (C5, §4.4, §9).
#[derive(Error, Debug)]
pub enum ExprError {
    #[error("unsafe or unparseable expression: {0}")]
    UnsafeExpression(String),

    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),

    #[error("unexpected end of expression")]
    UnexpectedEof,

    #[error("type mismatch evaluating comparison: {0}")]
    TypeMismatch(String),

    #[error("unknown helper call: {0}")]
    UnknownHelper(String),
}

/// Metric registry / field validation failures (C6, §4.5).
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric '{metric}' missing required field '{field}'")]
    MissingField { metric: String, field: String },

    #[error("metric '{metric}' field '{field}' expected type {expected}, got {actual}")]
    TypeMismatch {
        metric: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("metric '{metric}' field '{field}' must be non-empty")]
    EmptyField { metric: String, field: String },

    #[error("no valid metrics requested")]
    NoValidMetrics,
}

/// Provider dispatch failures (C8, §4.7, §7).
#[derive(Error, Debug)]
pub enum ProviderDispatchError {
    #[error("unknown provider '{requested}', expected one of: {available}")]
    UnknownProvider { requested: String, available: String },

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("transport error: {0}")]
    Transport(#[from] ark_evaluator_llm::TransportError),

    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("evaluation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ProviderDispatchError {
    /// Maps this error onto the §7 error taxonomy's `error_type` tag.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderDispatchError::UnknownProvider { .. } => "ConfigurationError",
            ProviderDispatchError::MissingParameter(_) => "ConfigurationError",
            ProviderDispatchError::Resolver(ResolverError::NotFound { .. }) => "ResourceNotFound",
            ProviderDispatchError::Resolver(ResolverError::Forbidden { .. }) => "Forbidden",
            ProviderDispatchError::Resolver(_) => "ConfigurationError",
            ProviderDispatchError::Transport(_) => "UpstreamFailure",
            ProviderDispatchError::Expr(_) => "EvaluationError",
            ProviderDispatchError::Metric(MetricError::NoValidMetrics) => "ValidationError",
            ProviderDispatchError::Metric(_) => "EvaluationError",
            ProviderDispatchError::Timeout(_) => "Timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_marker_for_secret_not_found() {
        let err = ResolverError::SecretKeyNotFound {
            name: "creds".into(),
            key: "apiKey".into(),
        };
        assert_eq!(err.marker(), "<secret-not-found:creds/apiKey>");
    }

    #[test]
    fn dispatch_error_type_mapping() {
        let err = ProviderDispatchError::MissingParameter("model.name".into());
        assert_eq!(err.error_type(), "ConfigurationError");

        let err = ProviderDispatchError::Resolver(ResolverError::Forbidden {
            kind: "Secret".into(),
            name: "creds".into(),
        });
        assert_eq!(err.error_type(), "Forbidden");
    }
}
