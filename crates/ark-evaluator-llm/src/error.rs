//! Transport error types for ark-evaluator-llm.

use thiserror::Error;

/// Errors that can occur issuing a chat-completion request (§4.2, §7
/// `UpstreamFailure`).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The provider has not been configured (e.g. missing API key).
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider returned a non-2xx response.
    #[error("upstream error: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The provider returned a rate-limit response after the single retry
    /// already attempted (§4.2).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The response body could not be parsed into a chat completion.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request exceeded its timeout budget.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// An HTTP-level error from reqwest (connection failure, DNS, etc).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_upstream() {
        let err = TransportError::Upstream {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "upstream error: HTTP 500: boom");
    }

    #[test]
    fn display_rate_limited() {
        let err = TransportError::RateLimited {
            retry_after_ms: 1000,
        };
        assert_eq!(err.to_string(), "rate limited: retry after 1000ms");
    }

    #[test]
    fn display_not_configured() {
        let err = TransportError::NotConfigured("set model.name".into());
        assert_eq!(err.to_string(), "provider not configured: set model.name");
    }
}
