//! Shared state handed to every handler (§5 "Shared resources").
//!
//! Built exactly once at startup: a process-wide HTTP transport, a
//! lazily-initialized Kubernetes client (behind `ResourceResolver`), and
//! the no-op trace sink. No request-local state is constructed except the
//! `ProviderContext` wrapper, which is cheap to clone (everything inside
//! it is an `Arc` or a plain value).

use std::sync::Arc;

use ark_evaluator_core::{Config, NoopTraceSink, ProviderContext, ResourceResolver};
use ark_evaluator_llm::{HttpLlmTransport, LlmTransport};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// One process-wide transport, built once at startup (§5 "Shared
    /// resources" -- the HTTP client is safe for concurrent use and must
    /// not be rebuilt per request).
    transport: Arc<dyn LlmTransport>,
    trace_sink: Arc<NoopTraceSink>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config: Arc::new(config),
            transport: Arc::new(HttpLlmTransport::new()),
            trace_sink: Arc::new(NoopTraceSink),
        }
    }

    /// Build a fresh `ProviderContext` for one request. Only the resolver
    /// is constructed per request (it is cheap -- the Kubernetes client it
    /// wraps is looked up through the process-wide one-shot guard); the
    /// transport and trace sink are shared (§4.1, §5).
    pub async fn provider_context(&self) -> ProviderContext {
        let resolver =
            ResourceResolver::new(self.config.kube_client_mode, self.config.default_namespace.clone()).await;
        ProviderContext {
            resolver,
            transport: self.transport.clone(),
            trace_sink: self.trace_sink.clone(),
            kube_client_mode: self.config.kube_client_mode,
            default_namespace: self.config.default_namespace.clone(),
            baseline_concurrency: self.config.baseline_concurrency,
        }
    }
}
