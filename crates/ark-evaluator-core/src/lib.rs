//! Evaluation dispatch, event DSL, and metric orchestration engine for
//! ark-evaluator.
//!
//! This crate has no HTTP surface of its own (`ark-evaluator-api` owns
//! that); it is the library the facade calls into for every subsystem
//! named in the design: resource resolution (C1), event analysis and
//! helpers (C3/C4), the expression evaluator (C5), the metric registry
//! (C6), the scoring adapter (C7), the provider dispatcher (C8), and the
//! baseline aggregator (C9).

pub mod baseline;
pub mod config;
pub mod crd;
pub mod error;
pub mod event_analyzer;
pub mod expr;
pub mod helpers;
pub mod k8s_client;
pub mod metrics;
pub mod providers;
pub mod resolver;
pub mod scoring;
pub mod trace;

pub use config::{Config, KubeClientMode};
pub use error::{ExprError, MetricError, ProviderDispatchError, ResolverError};
pub use event_analyzer::EventAnalyzer;
pub use expr::evaluate_rule;
pub use providers::{dispatch, ProviderContext, ProviderKind};
pub use resolver::{AgentInstructions, QueryMetrics, ResolvedModel, ResourceResolver};
pub use trace::{EvaluationTrace, NoopTraceSink, TraceSink};
