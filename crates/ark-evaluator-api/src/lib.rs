//! HTTP facade for ark-evaluator (C10, §4.9).
//!
//! JSON decode and routing live here; every other subsystem is owned by
//! `ark-evaluator-core`. This crate's only job is turning HTTP requests
//! into `EvaluationRequest`s and provider-dispatch outcomes into HTTP
//! responses (§4.9 "Facade responsibilities").

pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorBody};
pub use state::AppState;

/// Build the full axum router: `/evaluate`, the metrics-descriptor
/// endpoints, and the health/readiness probes, wrapped in a permissive
/// CORS layer and request tracing -- mirroring how the teacher's
/// `clawft-services::api::build_router` layers its dashboard API.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::api_routes())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
