//! The single translation point from every crate's error type into an
//! outbound HTTP response (§4.9, §7, §10 "Error handling").
//!
//! Mirrors how `clawft-services::error` centralizes error-to-response
//! mapping: one thin wrapper implementing axum's `IntoResponse`, built
//! from whichever subsystem error the facade caught.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ark_evaluator_core::ProviderDispatchError;

/// Outbound error body shape (§4.9, §7: "a failure always carries `error`
/// plus structured `metadata.error_type`").
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_type: &'static str,
}

/// Wraps a provider-dispatch failure (or a facade-level validation
/// failure) for translation into `(StatusCode, Json<ErrorBody>)`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: ErrorBody {
                error: message.into(),
                error_type: "ValidationError",
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: message.into(),
                error_type: "ResourceNotFound",
            },
        }
    }
}

impl From<ProviderDispatchError> for ApiError {
    fn from(err: ProviderDispatchError) -> Self {
        let error_type = err.error_type();
        let status = match error_type {
            "ConfigurationError" => StatusCode::BAD_REQUEST,
            "ResourceNotFound" => StatusCode::NOT_FOUND,
            "Forbidden" => StatusCode::FORBIDDEN,
            "ValidationError" => StatusCode::UNPROCESSABLE_ENTITY,
            "Timeout" => StatusCode::GATEWAY_TIMEOUT,
            // UpstreamFailure, EvaluationError, and anything unforeseen.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            body: ErrorBody {
                error: err.to_string(),
                error_type,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
