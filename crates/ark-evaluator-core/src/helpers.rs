//! Helper Set (C4, §4.3): thin semantic facades over a parsed event
//! stream, used directly by the HTTP-adjacent providers and substituted
//! into expressions by the expression evaluator (C5).
//!
//! Counting contract (§9 open question, resolved): every helper counts
//! only **Start** events to avoid double-counting Start+Complete pairs,
//! applied uniformly rather than porting the original implementation's
//! per-helper inconsistency.

use std::collections::HashMap;

use ark_evaluator_types::{parse_duration, ParsedEvent};

/// Shared view over the event stream every helper queries. Helpers borrow
/// this rather than each owning a copy.
pub struct EventView<'a> {
    events: &'a [ParsedEvent],
}

impl<'a> EventView<'a> {
    pub fn new(events: &'a [ParsedEvent]) -> Self {
        EventView { events }
    }

    /// The raw event slice this view wraps, newest-first (§4.3). Used by
    /// the pattern/CEL fallback in the expression evaluator, which has no
    /// helper-method equivalent for ad hoc `events.*` expressions.
    pub fn events(&self) -> &'a [ParsedEvent] {
        self.events
    }

    fn by_reason_prefix<'b>(&'b self, reasons: &'b [&'b str]) -> impl Iterator<Item = &'a ParsedEvent> + 'b {
        self.events
            .iter()
            .filter(move |e| reasons.iter().any(|r| e.reason == *r))
    }

    pub fn tool(&self) -> ToolHelper<'_> {
        ToolHelper { view: self }
    }

    pub fn agent(&self) -> AgentHelper<'_> {
        AgentHelper { view: self }
    }

    pub fn team(&self) -> TeamHelper<'_> {
        TeamHelper { view: self }
    }

    pub fn llm(&self) -> LlmHelper<'_> {
        LlmHelper { view: self }
    }

    pub fn sequence(&self) -> SequenceHelper<'_> {
        SequenceHelper { view: self }
    }

    pub fn query(&self) -> QueryHelper<'_> {
        QueryHelper { view: self }
    }
}

/// Bundled counters returned by `*.get_execution_metrics(name)` (§4.4):
/// the DSL substitution layer accesses `.call_count`/`.success_rate` as a
/// trailing attribute on the call rather than constructing this directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionMetrics {
    pub call_count: usize,
    pub success_rate: f64,
}

fn success_rate(complete: usize, error: usize) -> f64 {
    let denom = complete + error;
    if denom == 0 {
        0.0
    } else {
        complete as f64 / denom as f64
    }
}

fn matches_name(event: &ParsedEvent, name_field: fn(&ark_evaluator_types::ParsedEventMetadata) -> Option<&str>, name: Option<&str>) -> bool {
    match name {
        None => true,
        Some(name) => event
            .metadata
            .as_ref()
            .and_then(name_field)
            .is_some_and(|n| n == name),
    }
}

fn tool_name(m: &ark_evaluator_types::ParsedEventMetadata) -> Option<&str> {
    m.tool_name.as_deref()
}
fn agent_name(m: &ark_evaluator_types::ParsedEventMetadata) -> Option<&str> {
    m.agent_name.as_deref()
}
fn team_name(m: &ark_evaluator_types::ParsedEventMetadata) -> Option<&str> {
    m.team_name.as_deref()
}
fn model_name(m: &ark_evaluator_types::ParsedEventMetadata) -> Option<&str> {
    m.model_name.as_deref()
}

/// `tool.*` helper.
pub struct ToolHelper<'a> {
    view: &'a EventView<'a>,
}

impl ToolHelper<'_> {
    fn starts(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["ToolCallStart"])
            .filter(|e| matches_name(e, tool_name, name))
            .collect()
    }

    fn completes(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["ToolCallComplete"])
            .filter(|e| matches_name(e, tool_name, name))
            .collect()
    }

    fn errors(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["ToolCallError"])
            .filter(|e| matches_name(e, tool_name, name))
            .collect()
    }

    pub fn was_called(&self, name: Option<&str>) -> bool {
        !self.starts(name).is_empty()
    }

    pub fn get_call_count(&self, name: Option<&str>) -> usize {
        self.starts(name).len()
    }

    pub fn get_success_rate(&self, name: Option<&str>) -> f64 {
        success_rate(self.completes(name).len(), self.errors(name).len())
    }

    pub fn had_error(&self, name: Option<&str>) -> bool {
        !self.errors(name).is_empty()
    }

    /// `tool.get_execution_metrics('n').call_count` / `.success_rate` (§4.4).
    pub fn get_execution_metrics(&self, name: Option<&str>) -> ExecutionMetrics {
        ExecutionMetrics {
            call_count: self.get_call_count(name),
            success_rate: self.get_success_rate(name),
        }
    }

    /// Parsed durations from `Complete` events' `metadata.duration` field.
    pub fn get_execution_times(&self, name: Option<&str>) -> Vec<f64> {
        self.completes(name)
            .into_iter()
            .filter_map(|e| e.metadata.as_ref()?.duration.as_deref())
            .filter_map(parse_duration)
            .collect()
    }

    /// The JSON `parameters` object recorded on a `ToolCallStart` event for
    /// `name` (the most recent call, if called more than once).
    pub fn get_parameters(&self, name: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.starts(Some(name))
            .into_iter()
            .find_map(|e| e.metadata.as_ref()?.parameters_object())
    }

    /// Case-insensitive substring match of `parameters[key]` against
    /// `value` (§4.4).
    pub fn parameter_contains(&self, name: &str, key: &str, value: &str) -> bool {
        let Some(params) = self.get_parameters(name) else {
            return false;
        };
        let Some(v) = params.get(key) else {
            return false;
        };
        let haystack = match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        haystack.to_ascii_lowercase().contains(&value.to_ascii_lowercase())
    }

    /// Natural type-name match for `parameters[key]` (§4.4):
    /// `string→string`, `integer→integer`, `float→int|float`, `boolean→bool`.
    pub fn parameter_type(&self, name: &str, key: &str, expected: &str) -> bool {
        let Some(params) = self.get_parameters(name) else {
            return false;
        };
        let Some(v) = params.get(key) else {
            return false;
        };
        match expected {
            "string" => v.is_string(),
            "integer" => v.is_i64() || v.is_u64(),
            "float" => v.is_f64() || v.is_i64() || v.is_u64(),
            "boolean" => v.is_boolean(),
            _ => false,
        }
    }
}

/// `agent.*` helper.
pub struct AgentHelper<'a> {
    view: &'a EventView<'a>,
}

impl AgentHelper<'_> {
    fn starts(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["AgentExecutionStart"])
            .filter(|e| matches_name(e, agent_name, name))
            .collect()
    }

    fn completes(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["AgentExecutionComplete"])
            .filter(|e| matches_name(e, agent_name, name))
            .collect()
    }

    fn errors(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["AgentExecutionError"])
            .filter(|e| matches_name(e, agent_name, name))
            .collect()
    }

    pub fn was_executed(&self, name: Option<&str>) -> bool {
        !self.starts(name).is_empty()
    }

    pub fn get_execution_count(&self, name: Option<&str>) -> usize {
        self.starts(name).len()
    }

    pub fn get_success_rate(&self, name: Option<&str>) -> f64 {
        success_rate(self.completes(name).len(), self.errors(name).len())
    }

    pub fn get_error_details(&self, name: Option<&str>) -> Vec<String> {
        self.errors(name)
            .into_iter()
            .filter_map(|e| e.metadata.as_ref()?.error.clone())
            .collect()
    }

    /// `agent.get_execution_metrics('n').call_count` / `.success_rate`
    /// (§4.4 agent analog): `call_count` here is the execution count.
    pub fn get_execution_metrics(&self, name: Option<&str>) -> ExecutionMetrics {
        ExecutionMetrics {
            call_count: self.get_execution_count(name),
            success_rate: self.get_success_rate(name),
        }
    }

    pub fn get_models_used_by(&self, name: &str) -> Vec<String> {
        let mut models: Vec<String> = self
            .starts(Some(name))
            .into_iter()
            .filter_map(|e| e.metadata.as_ref()?.model_name.clone())
            .collect();
        models.sort();
        models.dedup();
        models
    }
}

/// `team.*` helper.
pub struct TeamHelper<'a> {
    view: &'a EventView<'a>,
}

impl TeamHelper<'_> {
    fn starts(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["TeamExecutionStart"])
            .filter(|e| matches_name(e, team_name, name))
            .collect()
    }

    fn completes(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["TeamExecutionComplete"])
            .filter(|e| matches_name(e, team_name, name))
            .collect()
    }

    pub fn was_executed(&self, name: Option<&str>) -> bool {
        !self.starts(name).is_empty()
    }

    /// Team events carry no dedicated `Error` reason (§6); a team run is
    /// treated as erroring when it started but never completed.
    pub fn get_success_rate(&self, name: Option<&str>) -> f64 {
        let started = self.starts(name).len();
        let completed = self.completes(name).len();
        success_rate(completed, started.saturating_sub(completed))
    }
}

/// `llm.*` helper.
pub struct LlmHelper<'a> {
    view: &'a EventView<'a>,
}

impl LlmHelper<'_> {
    fn starts(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["LLMCallStart"])
            .filter(|e| matches_name(e, model_name, name))
            .collect()
    }

    fn completes(&self, name: Option<&str>) -> Vec<&ParsedEvent> {
        self.view
            .by_reason_prefix(&["LLMCallComplete"])
            .filter(|e| matches_name(e, model_name, name))
            .collect()
    }

    pub fn get_call_count(&self, name: Option<&str>) -> usize {
        self.starts(name).len()
    }

    /// No dedicated `LLMCallError` reason is defined (§6); a call that
    /// started but never completed counts as an error.
    pub fn get_success_rate(&self, name: Option<&str>) -> f64 {
        let started = self.starts(name).len();
        let completed = self.completes(name).len();
        success_rate(completed, started.saturating_sub(completed))
    }

    /// `llm.get_execution_metrics('n').call_count` / `.success_rate`
    /// (§4.4 llm analog).
    pub fn get_execution_metrics(&self, name: Option<&str>) -> ExecutionMetrics {
        ExecutionMetrics {
            call_count: self.get_call_count(name),
            success_rate: self.get_success_rate(name),
        }
    }

    pub fn get_response_times(&self, name: Option<&str>) -> Vec<f64> {
        self.completes(name)
            .into_iter()
            .filter_map(|e| e.metadata.as_ref()?.duration.as_deref())
            .filter_map(parse_duration)
            .collect()
    }

    /// Token usage summed per model name, from `Complete` events.
    pub fn get_usage_by_model(&self) -> HashMap<String, u64> {
        let mut usage = HashMap::new();
        for event in self.view.by_reason_prefix(&["LLMCallComplete"]) {
            let Some(meta) = &event.metadata else { continue };
            let Some(model) = &meta.model_name else { continue };
            let total = meta.prompt_tokens.unwrap_or(0) + meta.completion_tokens.unwrap_or(0);
            *usage.entry(model.clone()).or_insert(0) += total;
        }
        usage
    }

    fn mean_response_time_by_model(&self) -> HashMap<String, f64> {
        let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
        for event in self.view.by_reason_prefix(&["LLMCallComplete"]) {
            let Some(meta) = &event.metadata else { continue };
            let Some(model) = &meta.model_name else { continue };
            let Some(duration) = meta.duration.as_deref().and_then(parse_duration) else {
                continue;
            };
            let entry = totals.entry(model.clone()).or_insert((0.0, 0));
            entry.0 += duration;
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|(model, (sum, count))| (model, sum / count as f64))
            .collect()
    }

    pub fn get_fastest_model(&self) -> Option<String> {
        self.mean_response_time_by_model()
            .into_iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(model, _)| model)
    }

    pub fn get_slowest_model(&self) -> Option<String> {
        self.mean_response_time_by_model()
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(model, _)| model)
    }
}

/// `sequence.*` helper: order-sensitive checks over the full event
/// reason stream (in stream order, not necessarily chronological --
/// callers pass an already-sorted `EventView`, §4.3).
pub struct SequenceHelper<'a> {
    view: &'a EventView<'a>,
}

impl SequenceHelper<'_> {
    fn reasons_oldest_first(&self) -> Vec<&str> {
        // EventView carries newest-first order (§4.3); sequence checks
        // read naturally oldest-first, so reverse.
        let mut reasons: Vec<&str> = self.view.events.iter().map(|e| e.reason.as_str()).collect();
        reasons.reverse();
        reasons
    }

    /// `expected` must appear as a contiguous, in-order subsequence when
    /// `strict`; otherwise any (non-contiguous) in-order occurrence
    /// suffices.
    pub fn check_execution_order(&self, expected: &[&str], strict: bool) -> bool {
        let reasons = self.reasons_oldest_first();
        if expected.is_empty() {
            return true;
        }
        if strict {
            reasons
                .windows(expected.len())
                .any(|window| window == expected)
        } else {
            let mut it = reasons.iter();
            expected.iter().all(|want| it.any(|have| have == want))
        }
    }

    /// Order-agnostic "all reasons present" check (§4.3, reconciling the
    /// two source helpers this was distilled from).
    pub fn was_completed(&self, expected: &[&str], strict: bool) -> bool {
        if strict {
            return self.check_execution_order(expected, true);
        }
        let reasons: std::collections::HashSet<&str> = self.view.events.iter().map(|e| e.reason.as_str()).collect();
        expected.iter().all(|want| reasons.contains(want))
    }

    /// Seconds between the first occurrence of `reason_a` and the first
    /// occurrence of `reason_b` at or after it (oldest-first order).
    /// Returns `None` if either reason is missing or both lack timestamps.
    pub fn get_time_between_events(&self, reason_a: &str, reason_b: &str) -> Option<f64> {
        let mut ordered: Vec<&ParsedEvent> = self.view.events.iter().collect();
        ordered.sort_by_key(|e| e.sort_key());
        let a = ordered.iter().find(|e| e.reason == reason_a)?;
        let b = ordered.iter().find(|e| e.reason == reason_b)?;
        let ts_a = a.first_timestamp.or(a.last_timestamp)?;
        let ts_b = b.first_timestamp.or(b.last_timestamp)?;
        Some((ts_b - ts_a).num_milliseconds() as f64 / 1000.0)
    }

    /// Detects events whose start/end windows overlap by more than
    /// `threshold` seconds -- a heuristic proxy for parallel tool/agent
    /// execution, since the event stream carries no explicit concurrency
    /// marker.
    pub fn detect_parallel_execution(&self, threshold: f64) -> bool {
        let mut starts: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> = Vec::new();
        for event in self.view.events.iter().filter(|e| e.is_start()) {
            let Some(start) = event.first_timestamp else { continue };
            let Some(meta) = &event.metadata else { continue };
            let Some(duration) = meta.duration.as_deref().and_then(parse_duration) else {
                continue;
            };
            let end = start + chrono::Duration::milliseconds((duration * 1000.0) as i64);
            starts.push((start, end));
        }
        for i in 0..starts.len() {
            for j in (i + 1)..starts.len() {
                let overlap_start = starts[i].0.max(starts[j].0);
                let overlap_end = starts[i].1.min(starts[j].1);
                let overlap_secs = (overlap_end - overlap_start).num_milliseconds() as f64 / 1000.0;
                if overlap_secs > threshold {
                    return true;
                }
            }
        }
        false
    }
}

/// `query.*` helper.
pub struct QueryHelper<'a> {
    view: &'a EventView<'a>,
}

impl QueryHelper<'_> {
    pub fn was_resolved(&self) -> bool {
        self.view
            .by_reason_prefix(&["QueryResolveComplete"])
            .next()
            .is_some()
    }

    pub fn get_execution_time(&self) -> Option<f64> {
        self.view
            .by_reason_prefix(&["QueryResolveComplete"])
            .find_map(|e| e.metadata.as_ref()?.duration.as_deref())
            .and_then(parse_duration)
    }

    pub fn get_resolution_status(&self) -> &'static str {
        if self.view.by_reason_prefix(&["QueryResolveError"]).next().is_some() {
            "error"
        } else if self.was_resolved() {
            "resolved"
        } else {
            "pending"
        }
    }

    /// Flattened summary keyed by session, matching the shape the HTTP
    /// facade flattens into `metadata` (§4.8 flattening convention).
    pub fn get_session_summary(&self) -> HashMap<String, String> {
        let mut summary = HashMap::new();
        summary.insert("status".to_string(), self.get_resolution_status().to_string());
        summary.insert(
            "tool_calls".to_string(),
            self.view
                .by_reason_prefix(&["ToolCallStart"])
                .count()
                .to_string(),
        );
        summary.insert(
            "agent_executions".to_string(),
            self.view
                .by_reason_prefix(&["AgentExecutionStart"])
                .count()
                .to_string(),
        );
        summary.insert(
            "llm_calls".to_string(),
            self.view.by_reason_prefix(&["LLMCallStart"]).count().to_string(),
        );
        summary
    }

    /// A coarse complexity score in `[0, 1]` derived from event volume and
    /// diversity (supplemented from `original_source/helpers/query_helper.py`,
    /// §4.3 SPEC_FULL extension): more distinct reasons and more total
    /// events both push the score up, saturating rather than growing
    /// unbounded.
    pub fn get_query_complexity_metrics(&self) -> HashMap<String, f64> {
        let total = self.view.events.len();
        let distinct_reasons: std::collections::HashSet<&str> =
            self.view.events.iter().map(|e| e.reason.as_str()).collect();
        let volume_score = (total as f64 / 20.0).min(1.0);
        let diversity_score = (distinct_reasons.len() as f64 / 10.0).min(1.0);
        let complexity = (volume_score * 0.5) + (diversity_score * 0.5);
        let mut metrics = HashMap::new();
        metrics.insert("complexity_score".to_string(), complexity);
        metrics.insert("event_count".to_string(), total as f64);
        metrics.insert("distinct_reason_count".to_string(), distinct_reasons.len() as f64);
        metrics
    }

    /// Whether the query's total resolution time exceeded `threshold_secs`
    /// (supplemented from `original_source/helpers/query_helper.py`).
    pub fn was_query_timeout(&self, threshold_secs: f64) -> bool {
        self.get_execution_time()
            .is_some_and(|secs| secs > threshold_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_evaluator_types::{EventType, InvolvedObject, ParsedEventMetadata};
    use chrono::{Duration as ChronoDuration, Utc};

    fn event(reason: &str, offset_secs: i64, metadata: Option<ParsedEventMetadata>) -> ParsedEvent {
        let ts = Utc::now() + ChronoDuration::seconds(offset_secs);
        ParsedEvent {
            name: format!("{reason}-{offset_secs}"),
            namespace: "default".into(),
            reason: reason.into(),
            message: String::new(),
            first_timestamp: Some(ts),
            last_timestamp: Some(ts),
            count: 1,
            event_type: EventType::Normal,
            involved_object: InvolvedObject::default(),
            metadata,
        }
    }

    fn meta_tool(name: &str, params: Option<serde_json::Value>) -> ParsedEventMetadata {
        ParsedEventMetadata {
            tool_name: Some(name.to_string()),
            parameters: params,
            ..Default::default()
        }
    }

    #[test]
    fn tool_was_called_and_call_count() {
        let events = vec![event("ToolCallStart", 0, Some(meta_tool("search", None)))];
        let view = EventView::new(&events);
        assert!(view.tool().was_called(Some("search")));
        assert_eq!(view.tool().get_call_count(Some("search")), 1);
        assert!(!view.tool().was_called(Some("other")));
    }

    #[test]
    fn tool_parameter_contains_is_case_insensitive() {
        let params = serde_json::json!({"q": "Hello World"});
        let events = vec![event("ToolCallStart", 0, Some(meta_tool("search", Some(params))))];
        let view = EventView::new(&events);
        assert!(view.tool().parameter_contains("search", "q", "hello"));
        assert!(!view.tool().parameter_contains("search", "q", "goodbye"));
    }

    #[test]
    fn tool_parameter_type_matches_natural_mapping() {
        let params = serde_json::json!({"count": 3, "ratio": 1.5, "flag": true, "name": "x"});
        let events = vec![event("ToolCallStart", 0, Some(meta_tool("t", Some(params))))];
        let view = EventView::new(&events);
        let tool = view.tool();
        assert!(tool.parameter_type("t", "count", "integer"));
        assert!(tool.parameter_type("t", "ratio", "float"));
        assert!(tool.parameter_type("t", "flag", "boolean"));
        assert!(tool.parameter_type("t", "name", "string"));
        assert!(!tool.parameter_type("t", "name", "integer"));
    }

    #[test]
    fn success_rate_zero_when_no_completions_or_errors() {
        let events: Vec<ParsedEvent> = vec![];
        let view = EventView::new(&events);
        assert_eq!(view.tool().get_success_rate(None), 0.0);
    }

    #[test]
    fn success_rate_computed_from_complete_and_error_counts() {
        let events = vec![
            event("ToolCallStart", 0, Some(meta_tool("t", None))),
            event("ToolCallComplete", 1, Some(meta_tool("t", None))),
            event("ToolCallStart", 2, Some(meta_tool("t", None))),
            event("ToolCallError", 3, Some(meta_tool("t", None))),
        ];
        let view = EventView::new(&events);
        assert_eq!(view.tool().get_success_rate(Some("t")), 0.5);
    }

    #[test]
    fn sequence_check_execution_order_strict_requires_adjacency() {
        let events = vec![
            event("AgentExecutionStart", 0, None),
            event("ToolCallStart", 1, None),
            event("ToolCallComplete", 2, None),
            event("AgentExecutionComplete", 3, None),
        ];
        let view = EventView::new(&events);
        let seq = view.sequence();
        let expected = ["AgentExecutionStart", "ToolCallComplete", "AgentExecutionComplete"];
        assert!(seq.was_completed(&expected, false));
        assert!(!seq.check_execution_order(&expected, true));

        let contiguous = ["ToolCallStart", "ToolCallComplete"];
        assert!(seq.check_execution_order(&contiguous, true));
    }

    #[test]
    fn sequence_time_between_events() {
        let events = vec![event("A", 0, None), event("B", 5, None)];
        let view = EventView::new(&events);
        let secs = view.sequence().get_time_between_events("A", "B").unwrap();
        assert!((secs - 5.0).abs() < 0.01);
    }

    #[test]
    fn query_complexity_metrics_saturate() {
        let events: Vec<ParsedEvent> = (0..50).map(|i| event("ToolCallStart", i, None)).collect();
        let view = EventView::new(&events);
        let metrics = view.query().get_query_complexity_metrics();
        assert!(metrics["complexity_score"] <= 1.0);
    }
}
