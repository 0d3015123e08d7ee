//! Pattern/CEL-flavored fallback for event rules that are not expressed in
//! the `entity.method(...)` helper DSL (§4.4, §9). Used when a rule body
//! contains none of the recognized helper-call prefixes: rather than reject
//! it outright, a handful of common shorthand patterns are recognized
//! directly against the raw event stream, and anything left over falls back
//! to a default truthy-if-nonempty judgment.

use std::sync::OnceLock;

use regex::Regex;

use ark_evaluator_types::ParsedEvent;

fn exists_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^events\.exists\(\s*['"]([^'"]+)['"]\s*\)$"#).expect("static regex is valid")
    })
}

fn size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^events\.size\(\)\s*(==|!=|>=|<=|>|<)\s*(\d+)$").expect("static regex is valid")
    })
}

fn compare_count(count: usize, op: &str, want: usize) -> bool {
    match op {
        "==" => count == want,
        "!=" => count != want,
        ">=" => count >= want,
        "<=" => count <= want,
        ">" => count > want,
        "<" => count < want,
        _ => false,
    }
}

/// Evaluate a rule body against the raw event stream using the recognized
/// shorthand patterns, falling back to "nonempty" truthiness when nothing
/// more specific matches.
pub fn evaluate_fallback(expression: &str, events: &[ParsedEvent]) -> bool {
    let trimmed = expression.trim();

    if let Some(caps) = exists_pattern().captures(trimmed) {
        let reason = &caps[1];
        return events.iter().any(|e| e.reason == reason);
    }

    if let Some(caps) = size_pattern().captures(trimmed) {
        let op = &caps[1];
        let want: usize = caps[2].parse().unwrap_or(0);
        return compare_count(events.len(), op, want);
    }

    // Bare reason name, with no operators: treat as "this reason occurred".
    if !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return events.iter().any(|e| e.reason == trimmed);
    }

    // Default: an otherwise-unrecognized expression passes when the
    // relevant event stream is nonempty, rather than always failing --
    // absence of events is the common "nothing to judge" case.
    !events.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_evaluator_types::{EventType, InvolvedObject};

    fn event(reason: &str) -> ParsedEvent {
        ParsedEvent {
            name: "evt".into(),
            namespace: "default".into(),
            reason: reason.into(),
            message: String::new(),
            first_timestamp: Some(chrono::Utc::now()),
            last_timestamp: Some(chrono::Utc::now()),
            count: 1,
            event_type: EventType::Normal,
            involved_object: InvolvedObject::default(),
            metadata: None,
        }
    }

    #[test]
    fn exists_pattern_matches_reason() {
        let events = vec![event("ToolCallStart")];
        assert!(evaluate_fallback("events.exists('ToolCallStart')", &events));
        assert!(!evaluate_fallback("events.exists('AgentExecutionStart')", &events));
    }

    #[test]
    fn size_pattern_compares_count() {
        let events = vec![event("A"), event("B"), event("C")];
        assert!(evaluate_fallback("events.size() >= 3", &events));
        assert!(!evaluate_fallback("events.size() > 3", &events));
        assert!(evaluate_fallback("events.size() == 3", &events));
    }

    #[test]
    fn bare_reason_name_checks_occurrence() {
        let events = vec![event("ToolCallStart")];
        assert!(evaluate_fallback("ToolCallStart", &events));
        assert!(!evaluate_fallback("AgentExecutionStart", &events));
    }

    #[test]
    fn unrecognized_expression_defaults_to_nonempty_truthiness() {
        let events = vec![event("ToolCallStart")];
        assert!(evaluate_fallback("anything else entirely", &events));
        let empty: Vec<ParsedEvent> = vec![];
        assert!(!evaluate_fallback("anything else entirely", &empty));
    }
}
