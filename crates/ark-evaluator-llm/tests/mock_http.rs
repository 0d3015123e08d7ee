//! Integration tests for [`HttpLlmTransport`] against a fake HTTP endpoint.

use ark_evaluator_llm::{ChatParams, HttpLlmTransport, LlmTransport, TransportError};
use ark_evaluator_types::ModelConfig;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn model_for(base_url: String) -> ModelConfig {
    ModelConfig {
        model: "gpt-4o".into(),
        base_url,
        api_key: "sk-test".into(),
        api_version: None,
    }
}

#[tokio::test]
async fn chat_complete_happy_path_openai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "SCORE: 0.9\nPASSED: true"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })))
        .mount(&server)
        .await;

    let transport = HttpLlmTransport::new();
    let (content, usage) = transport
        .chat_complete("judge this", &model_for(server.uri()), ChatParams::default())
        .await
        .unwrap();

    assert!(content.contains("SCORE: 0.9"));
    assert_eq!(usage.total_tokens, 15);
}

#[tokio::test]
async fn chat_complete_azure_dialect_uses_api_key_header_and_deployment_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/azure-openai-resource/openai/deployments/gpt-4o/chat/completions"))
        .and(header("api-key", "az-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })))
        .mount(&server)
        .await;

    // Dialect is selected by an "azure" substring in the base URL (§4.2).
    let model = ModelConfig {
        model: "gpt-4o".into(),
        base_url: format!("{}/azure-openai-resource", server.uri()),
        api_key: "az-test".into(),
        api_version: Some("2024-05-01".into()),
    };

    let transport = HttpLlmTransport::new();
    let (content, usage) = transport
        .chat_complete("judge this", &model, ChatParams::default())
        .await
        .unwrap();

    assert_eq!(content, "ok");
    assert_eq!(usage.total_tokens, 2);
}

#[tokio::test]
async fn chat_complete_upstream_failure_surfaces_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let transport = HttpLlmTransport::new();
    let err = transport
        .chat_complete("judge this", &model_for(server.uri()), ChatParams::default())
        .await
        .unwrap_err();

    match err {
        TransportError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_complete_retries_once_on_rate_limit_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("judge"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let transport = HttpLlmTransport::new();
    let err = transport
        .chat_complete("judge this", &model_for(server.uri()), ChatParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::RateLimited { .. }));
}
