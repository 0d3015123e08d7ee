//! Resolved model configuration (§3 `ModelConfig`).

use serde::{Deserialize, Serialize};

/// Which chat-completion dialect a resolved model speaks (§4.2).
///
/// Selection is by substring: a `baseURL` containing `"azure"` selects the
/// Azure-OpenAI-style dialect, otherwise the OpenAI-compatible one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelDialect {
    OpenAi,
    Azure,
}

impl ModelDialect {
    pub fn detect(base_url: &str) -> Self {
        if base_url.to_ascii_lowercase().contains("azure") {
            ModelDialect::Azure
        } else {
            ModelDialect::OpenAi
        }
    }
}

/// A fully resolved model, ready to be used for a chat-completion call
/// (§3 `ModelConfig`). Created per request; never cached.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub api_version: Option<String>,
}

impl ModelConfig {
    pub fn dialect(&self) -> ModelDialect {
        ModelDialect::detect(&self.base_url)
    }

    /// The built-in "no Kubernetes" fallback model (§4.1, §9 open question).
    /// Tagged observably via `metadata["resolver.fallback"]` by the caller,
    /// not here -- this constructor only builds the config itself.
    pub fn fallback() -> Self {
        ModelConfig {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "placeholder-no-kubernetes-fallback-key".to_string(),
            api_version: None,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_detects_azure_by_substring() {
        assert_eq!(
            ModelDialect::detect("https://my-resource.openai.azure.com"),
            ModelDialect::Azure
        );
        assert_eq!(
            ModelDialect::detect("https://api.openai.com/v1"),
            ModelDialect::OpenAi
        );
    }

    #[test]
    fn debug_masks_api_key() {
        let cfg = ModelConfig {
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "sk-super-secret".into(),
            api_version: None,
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("***"));
    }
}
