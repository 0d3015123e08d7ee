//! `Model`, `Agent`, and `Query` custom resource definitions consumed by
//! the resolver (C1, §6 "Kubernetes custom resources consumed").

use ark_evaluator_types::{RawDuration, TokenUsage, ValueSource};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "ark.mckinsey.com";
pub const VERSION: &str = "v1alpha1";

/// `spec.type` on a `Model` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Openai,
    Azure,
    Bedrock,
}

/// `spec.config.<type>` on a `Model`: each field is a [`ValueSource`]
/// (§6, §9 "Resource dereference").
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ModelProviderConfig {
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<ValueSource>,
    #[serde(default, rename = "baseUrl")]
    pub base_url: Option<ValueSource>,
    #[serde(default, rename = "apiVersion")]
    pub api_version: Option<ValueSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfigByType {
    #[serde(default)]
    pub openai: Option<ModelProviderConfig>,
    #[serde(default)]
    pub azure: Option<ModelProviderConfig>,
    #[serde(default)]
    pub bedrock: Option<ModelProviderConfig>,
}

impl ModelConfigByType {
    pub fn for_type(&self, model_type: ModelType) -> Option<&ModelProviderConfig> {
        match model_type {
            ModelType::Openai => self.openai.as_ref(),
            ModelType::Azure => self.azure.as_ref(),
            ModelType::Bedrock => self.bedrock.as_ref(),
        }
    }
}

/// `Model` CRD spec (group `ark.mckinsey.com`, version `v1alpha1`, plural
/// `models`, §6).
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Model",
    plural = "models",
    namespaced
)]
pub struct ModelSpec {
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub model: ValueSource,
    #[serde(default)]
    pub config: ModelConfigByType,
}

/// `Agent` CRD spec (plural `agents`, §6).
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Agent",
    plural = "agents",
    namespaced
)]
pub struct AgentSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
}

/// A reference to a resolved response's target (§3 `responseTarget`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResponseTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    pub name: String,
}

/// One entry of `status.responses[]` on a `Query` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryResponseEntry {
    pub target: ResponseTarget,
    #[serde(default)]
    pub content: String,
}

/// `spec.modelRef` on a `Query`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelRef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// `Query` CRD spec (plural `queries`, §6).
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Query",
    plural = "queries",
    namespaced,
    status = "QueryStatus"
)]
pub struct QuerySpec {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub targets: Vec<ResponseTarget>,
    #[serde(default, rename = "modelRef")]
    pub model_ref: Option<ModelRef>,
}

/// `Query.status` (§3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryStatus {
    #[serde(default)]
    pub responses: Vec<QueryResponseEntry>,
    #[serde(default)]
    pub duration: Option<RawDuration>,
    #[serde(default, rename = "tokenUsage")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub phase: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_spec_deserializes_with_secret_ref() {
        let json = serde_json::json!({
            "type": "openai",
            "model": {"value": "gpt-4o"},
            "config": {
                "openai": {
                    "apiKey": {"valueFrom": {"secretKeyRef": {"name": "creds", "key": "apiKey"}}},
                    "baseUrl": {"value": "https://api.openai.com/v1"}
                }
            }
        });
        let spec: ModelSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.model_type, ModelType::Openai);
        assert_eq!(spec.model.value.as_deref(), Some("gpt-4o"));
        assert!(spec.config.openai.is_some());
    }

    #[test]
    fn query_status_accepts_both_duration_shapes() {
        let json = serde_json::json!({"duration": "1.5s"});
        let status: QueryStatus = serde_json::from_value(json).unwrap();
        assert_eq!(status.duration.unwrap().to_seconds(), 1.5);

        let json = serde_json::json!({"duration": {"seconds": 2, "microseconds": 0}});
        let status: QueryStatus = serde_json::from_value(json).unwrap();
        assert_eq!(status.duration.unwrap().to_seconds(), 2.0);
    }
}
