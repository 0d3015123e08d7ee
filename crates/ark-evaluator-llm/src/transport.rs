//! The single `chatComplete` operation (C2, §4.2).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use ark_evaluator_types::{ModelConfig, ModelDialect, TokenUsage};

use crate::error::{Result, TransportError};
use crate::types::{ChatMessage, ChatParams, ChatRequest, ChatResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Issues chat-completion requests against OpenAI-compatible and
/// Azure-OpenAI-style endpoints. One instance is shared process-wide
/// (§5 "Shared resources").
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat_complete(
        &self,
        prompt: &str,
        model: &ModelConfig,
        params: ChatParams,
    ) -> Result<(String, TokenUsage)>;
}

/// The real, `reqwest`-backed transport. Holds one process-wide HTTP client
/// with connection pooling (§5).
pub struct HttpLlmTransport {
    http: reqwest::Client,
}

impl HttpLlmTransport {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client configuration is always valid");
        HttpLlmTransport { http }
    }

    fn completions_url(&self, model: &ModelConfig) -> String {
        let base = model.base_url.trim_end_matches('/');
        match model.dialect() {
            ModelDialect::OpenAi => format!("{base}/chat/completions"),
            ModelDialect::Azure => {
                let version = model.api_version.as_deref().unwrap_or("2024-02-01");
                format!(
                    "{base}/openai/deployments/{}/chat/completions?api-version={version}",
                    model.model
                )
            }
        }
    }

    async fn send_once(
        &self,
        model: &ModelConfig,
        request: &ChatRequest,
    ) -> Result<reqwest::Response> {
        let url = self.completions_url(model);
        let builder = match model.dialect() {
            ModelDialect::OpenAi => self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", model.api_key)),
            ModelDialect::Azure => self.http.post(&url).header("api-key", &model.api_key),
        };
        Ok(builder
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?)
    }
}

impl Default for HttpLlmTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmTransport for HttpLlmTransport {
    async fn chat_complete(
        &self,
        prompt: &str,
        model: &ModelConfig,
        params: ChatParams,
    ) -> Result<(String, TokenUsage)> {
        let request = ChatRequest {
            model: model.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!(model = %model.model, dialect = ?model.dialect(), "sending chat completion request");

        let mut response = self.send_once(model, &request).await?;

        if response.status().as_u16() == 429 {
            let retry_after = retry_after_from_response(&response).unwrap_or(DEFAULT_RETRY_AFTER);
            warn!(retry_after_ms = retry_after.as_millis() as u64, "rate limited, retrying once");
            tokio::time::sleep(retry_after).await;
            response = self.send_once(model, &request).await?;
            if response.status().as_u16() == 429 {
                let retry_after =
                    retry_after_from_response(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                return Err(TransportError::RateLimited {
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "upstream chat completion failure");
            return Err(TransportError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        let content = chat_response.content();
        let usage = chat_response.token_usage();
        debug!(total_tokens = usage.total_tokens, "chat completion succeeded");
        Ok((content, usage))
    }
}

fn retry_after_from_response(response: &reqwest::Response) -> Option<Duration> {
    let header = response.headers().get("retry-after")?.to_str().ok()?;
    let secs: f64 = header.parse().ok()?;
    Some(Duration::from_secs_f64(secs.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_model() -> ModelConfig {
        ModelConfig {
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "sk-test".into(),
            api_version: None,
        }
    }

    fn azure_model() -> ModelConfig {
        ModelConfig {
            model: "gpt-4o-deployment".into(),
            base_url: "https://my-resource.openai.azure.com".into(),
            api_key: "az-test".into(),
            api_version: Some("2024-05-01".into()),
        }
    }

    #[test]
    fn completions_url_openai() {
        let transport = HttpLlmTransport::new();
        assert_eq!(
            transport.completions_url(&openai_model()),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn completions_url_azure() {
        let transport = HttpLlmTransport::new();
        let url = transport.completions_url(&azure_model());
        assert_eq!(
            url,
            "https://my-resource.openai.azure.com/openai/deployments/gpt-4o-deployment/chat/completions?api-version=2024-05-01"
        );
    }

    #[test]
    fn completions_url_strips_trailing_slash() {
        let mut model = openai_model();
        model.base_url.push('/');
        let transport = HttpLlmTransport::new();
        assert_eq!(
            transport.completions_url(&model),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
