//! Event-Expression Evaluator (C5, §4.4).
//!
//! Three layers, applied in order:
//! 1. [`substitution`] rewrites recognized `entity.method(args)` helper
//!    calls to grammar literals.
//! 2. [`grammar`] parses and evaluates the restricted boolean expression
//!    that results.
//! 3. [`fallback`] handles rule bodies that contain no recognized helper
//!    call at all, via a handful of pattern shorthands.

mod fallback;
mod grammar;
mod substitution;

use ark_evaluator_types::ParsedEvent;

use crate::error::ExprError;
use crate::helpers::EventView;

fn has_helper_call(expression: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "tool.", "tools.", "agent.", "agents.", "team.", "teams.", "llm.", "sequence.", "query.",
    ];
    PREFIXES.iter().any(|p| expression.contains(p))
}

/// Evaluate a single event rule's expression against `events`, returning
/// the boolean judgment (§4.4).
///
/// Dispatches to the helper-substitution + restricted-grammar pipeline when
/// the expression references the `entity.method(...)` DSL, otherwise falls
/// back to the pattern shorthands in [`fallback`].
pub fn evaluate_rule(expression: &str, events: &[ParsedEvent]) -> Result<bool, ExprError> {
    if has_helper_call(expression) {
        let view = EventView::new(events);
        let substituted = substitution::substitute(expression, &view)?;
        grammar::evaluate_expression(&substituted)
    } else {
        Ok(fallback::evaluate_fallback(expression, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_evaluator_types::{EventType, InvolvedObject, ParsedEventMetadata};

    fn event(reason: &str, metadata: Option<ParsedEventMetadata>) -> ParsedEvent {
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
            metadata,
        }
    }

    #[test]
    fn helper_dsl_rule_evaluates_end_to_end() {
        let events = vec![event(
            "ToolCallStart",
            Some(ParsedEventMetadata {
                tool_name: Some("search".into()),
                ..Default::default()
            }),
        )];
        assert!(evaluate_rule("tool.was_called('search')", &events).unwrap());
        assert!(!evaluate_rule("tool.was_called('other')", &events).unwrap());
    }

    #[test]
    fn combined_helper_expression_with_connectives() {
        let events = vec![
            event(
                "ToolCallStart",
                Some(ParsedEventMetadata {
                    tool_name: Some("search".into()),
                    ..Default::default()
                }),
            ),
            event(
                "ToolCallComplete",
                Some(ParsedEventMetadata {
                    tool_name: Some("search".into()),
                    ..Default::default()
                }),
            ),
        ];
        let expr = "tool.was_called('search') and tool.get_success_rate('search') >= 1.0";
        assert!(evaluate_rule(expr, &events).unwrap());
    }

    #[test]
    fn non_dsl_rule_uses_fallback() {
        let events = vec![event("ToolCallStart", None)];
        assert!(evaluate_rule("events.exists('ToolCallStart')", &events).unwrap());
        assert!(evaluate_rule("ToolCallStart", &events).unwrap());
    }
}
