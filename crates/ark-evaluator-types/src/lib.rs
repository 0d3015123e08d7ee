//! Domain types shared across the ark-evaluator workspace.
//!
//! This crate has no I/O of its own: it carries the wire-level request and
//! response shapes (§3, §6 of the design), the event/metric vocabulary used
//! by the event DSL and the metric registry, and the duration parser that
//! both subsystems depend on. Crates further up the stack (`ark-evaluator-llm`,
//! `ark-evaluator-core`, `ark-evaluator-api`) build behavior on top of these
//! shapes; none of it should leak back down here.

pub mod duration;
pub mod event;
pub mod metric;
pub mod model;
pub mod request;
pub mod value;

pub use duration::{parse_duration, RawDuration};
pub use event::{EventFilter, EventType, ParsedEvent, ParsedEventMetadata, Scope};
pub use metric::{FieldRequirement, FieldType, FieldValue, MetricDescriptor, MetricKind};
pub use model::{ModelConfig, ModelDialect};
pub use request::{
    EvaluationConfig, EvaluationRequest, EvaluationResponse, EventRule, GoldenExample,
    Parameters, ParameterValue, QueryRef, RequestType, TokenUsage,
};
pub use value::{KeyRef, ValueFrom, ValueSource};
