//! Langfuse-compatible trace sink interface (§4.7, §4.9 "Exit behavior").
//!
//! The concrete HTTP implementation is out of scope (§1); this trait and a
//! no-op default implementation exist so the `ragas`/`langfuse-trace`
//! dispatch path compiles and is testable without a live Langfuse server.

use ark_evaluator_types::TokenUsage;

/// One recorded evaluation, shaped for a Langfuse-style trace sink.
#[derive(Debug, Clone)]
pub struct EvaluationTrace {
    pub evaluator_name: String,
    pub provider: String,
    pub input: String,
    pub output: String,
    pub score: Option<f64>,
    pub passed: bool,
    pub token_usage: TokenUsage,
}

/// A sink an evaluation is recorded to after scoring completes.
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: EvaluationTrace);

    /// Block briefly on outstanding submissions at shutdown (§4.9). The
    /// no-op sink has nothing to flush.
    fn flush(&self) {}
}

/// Default sink used whenever no real Langfuse endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn record(&self, _trace: EvaluationTrace) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_a_trace_without_panicking() {
        let sink = NoopTraceSink;
        sink.record(EvaluationTrace {
            evaluator_name: "e".into(),
            provider: "ragas".into(),
            input: "q".into(),
            output: "a".into(),
            score: Some(0.9),
            passed: true,
            token_usage: TokenUsage::default(),
        });
        sink.flush();
    }
}
