//! Textual-substitution layer for the event-expression DSL (§4.4, §9).
//!
//! Rule authors write calls like `tool.was_called('search') and
//! agent.get_success_rate() > 0.8`. Before the restricted grammar in
//! [`super::grammar`] can parse and evaluate the expression, every
//! `entity.method(args)` call is replaced with its literal result (`True`,
//! `False`, a number, or a quoted string). This module owns that rewrite.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ExprError;
use crate::helpers::EventView;

/// Matches `entity.method(args)`, with an optional trailing `.attribute`
/// for the `get_execution_metrics('n').call_count` form (§4.4).
fn call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(tool|tools|agent|agents|team|teams|llm|sequence|query)\.(\w+)\(([^()]*)\)(?:\.(\w+))?")
            .expect("static regex is valid")
    })
}

/// A single parsed call argument.
#[derive(Debug, Clone)]
enum ArgToken {
    Str(String),
    Bool(bool),
    Number(f64),
    List(Vec<String>),
}

/// Split a raw argument list on top-level commas, respecting quotes and
/// brackets so `['a', 'b']` and `"has, comma"` survive intact.
fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | '(' => {
                    depth += 1;
                    current.push(c);
                }
                ']' | ')' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    args.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn parse_arg(raw: &str) -> ArgToken {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let items = split_args(inner)
            .into_iter()
            .map(|item| unquote(&item).to_string())
            .collect();
        return ArgToken::List(items);
    }
    if trimmed == "True" {
        return ArgToken::Bool(true);
    }
    if trimmed == "False" {
        return ArgToken::Bool(false);
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return ArgToken::Number(n);
    }
    ArgToken::Str(unquote(trimmed).to_string())
}

fn arg_as_str(args: &[ArgToken], index: usize) -> Option<&str> {
    match args.get(index) {
        Some(ArgToken::Str(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn arg_as_f64(args: &[ArgToken], index: usize) -> Option<f64> {
    match args.get(index) {
        Some(ArgToken::Number(n)) => Some(*n),
        _ => None,
    }
}

fn arg_as_list(args: &[ArgToken], index: usize) -> Vec<String> {
    match args.get(index) {
        Some(ArgToken::List(items)) => items.clone(),
        Some(ArgToken::Str(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn arg_as_bool(args: &[ArgToken], index: usize, default: bool) -> bool {
    match args.get(index) {
        Some(ArgToken::Bool(b)) => *b,
        _ => default,
    }
}

/// Literal text a call is replaced with, in the restricted grammar's
/// syntax (`True`/`False`, a bare number, or a single-quoted string).
fn literal_bool(b: bool) -> String {
    if b { "True".to_string() } else { "False".to_string() }
}

fn literal_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn literal_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "\\'"))
}

fn literal_string_list(items: &[String]) -> String {
    format!(
        "[{}]",
        items
            .iter()
            .map(|s| literal_string(s))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

/// Render the `.call_count`/`.success_rate` attribute of a
/// `get_execution_metrics(...)` result (§4.4). Any other trailing
/// attribute, or none at all, is an error: the form only exists to expose
/// these two fields.
fn execution_metrics_attr(
    entity: &str,
    metrics: crate::helpers::ExecutionMetrics,
    attr: Option<&str>,
) -> Result<String, ExprError> {
    match attr {
        Some("call_count") => Ok(literal_number(metrics.call_count as f64)),
        Some("success_rate") => Ok(literal_number(metrics.success_rate)),
        Some(other) => Err(ExprError::UnknownHelper(format!(
            "{entity}.get_execution_metrics(...).{other}"
        ))),
        None => Err(ExprError::UnknownHelper(format!(
            "{entity}.get_execution_metrics(...) requires a trailing .call_count or .success_rate"
        ))),
    }
}

/// Dispatch one `entity.method(args)` call against the helper set and
/// render its result as a grammar literal. `attr` carries the optional
/// trailing `.attribute` access used by `get_execution_metrics` (§4.4).
fn dispatch(
    view: &EventView<'_>,
    entity: &str,
    method: &str,
    args: &[ArgToken],
    attr: Option<&str>,
) -> Result<String, ExprError> {
    let name = arg_as_str(args, 0);
    match entity {
        "tool" | "tools" => {
            let tool = view.tool();
            match method {
                "was_called" => Ok(literal_bool(tool.was_called(name))),
                "get_call_count" => Ok(literal_number(tool.get_call_count(name) as f64)),
                "get_success_rate" => Ok(literal_number(tool.get_success_rate(name))),
                "had_error" => Ok(literal_bool(tool.had_error(name))),
                "get_execution_metrics" => execution_metrics_attr(entity, tool.get_execution_metrics(name), attr),
                "get_execution_times" => {
                    let times: Vec<String> = tool
                        .get_execution_times(name)
                        .into_iter()
                        .map(|t| literal_number(t))
                        .collect();
                    Ok(format!("[{}]", times.join(", ")))
                }
                "parameter_contains" => {
                    let tool_name = name.ok_or_else(|| ExprError::UnknownHelper(format!("{entity}.{method} requires a tool name")))?;
                    let key = arg_as_str(args, 1).unwrap_or_default();
                    let value = arg_as_str(args, 2).unwrap_or_default();
                    Ok(literal_bool(tool.parameter_contains(tool_name, key, value)))
                }
                "parameter_type" => {
                    let tool_name = name.ok_or_else(|| ExprError::UnknownHelper(format!("{entity}.{method} requires a tool name")))?;
                    let key = arg_as_str(args, 1).unwrap_or_default();
                    let expected = arg_as_str(args, 2).unwrap_or_default();
                    Ok(literal_bool(tool.parameter_type(tool_name, key, expected)))
                }
                other => Err(ExprError::UnknownHelper(format!("tool.{other}"))),
            }
        }
        "agent" | "agents" => {
            let agent = view.agent();
            match method {
                "was_executed" => Ok(literal_bool(agent.was_executed(name))),
                "get_execution_count" => Ok(literal_number(agent.get_execution_count(name) as f64)),
                "get_success_rate" => Ok(literal_number(agent.get_success_rate(name))),
                "get_execution_metrics" => execution_metrics_attr(entity, agent.get_execution_metrics(name), attr),
                "get_error_details" => Ok(literal_string_list(&agent.get_error_details(name))),
                "get_models_used_by" => {
                    let agent_name = name.ok_or_else(|| ExprError::UnknownHelper(format!("{entity}.{method} requires an agent name")))?;
                    Ok(literal_string_list(&agent.get_models_used_by(agent_name)))
                }
                other => Err(ExprError::UnknownHelper(format!("agent.{other}"))),
            }
        }
        "team" | "teams" => {
            let team = view.team();
            match method {
                "was_executed" => Ok(literal_bool(team.was_executed(name))),
                "get_success_rate" => Ok(literal_number(team.get_success_rate(name))),
                other => Err(ExprError::UnknownHelper(format!("team.{other}"))),
            }
        }
        "llm" => {
            let llm = view.llm();
            match method {
                "get_call_count" => Ok(literal_number(llm.get_call_count(name) as f64)),
                "get_success_rate" => Ok(literal_number(llm.get_success_rate(name))),
                "get_execution_metrics" => execution_metrics_attr(entity, llm.get_execution_metrics(name), attr),
                "get_response_times" => {
                    let times: Vec<String> = llm
                        .get_response_times(name)
                        .into_iter()
                        .map(literal_number)
                        .collect();
                    Ok(format!("[{}]", times.join(", ")))
                }
                "get_fastest_model" => Ok(match llm.get_fastest_model() {
                    Some(m) => literal_string(&m),
                    None => "''".to_string(),
                }),
                "get_slowest_model" => Ok(match llm.get_slowest_model() {
                    Some(m) => literal_string(&m),
                    None => "''".to_string(),
                }),
                other => Err(ExprError::UnknownHelper(format!("llm.{other}"))),
            }
        }
        "sequence" => {
            let seq = view.sequence();
            match method {
                "check_execution_order" => {
                    let expected = arg_as_list(args, 0);
                    let expected_refs: Vec<&str> = expected.iter().map(String::as_str).collect();
                    let strict = arg_as_bool(args, 1, false);
                    Ok(literal_bool(seq.check_execution_order(&expected_refs, strict)))
                }
                "was_completed" => {
                    let expected = arg_as_list(args, 0);
                    let expected_refs: Vec<&str> = expected.iter().map(String::as_str).collect();
                    let strict = arg_as_bool(args, 1, false);
                    Ok(literal_bool(seq.was_completed(&expected_refs, strict)))
                }
                "get_time_between_events" => {
                    let a = arg_as_str(args, 0).unwrap_or_default();
                    let b = arg_as_str(args, 1).unwrap_or_default();
                    Ok(match seq.get_time_between_events(a, b) {
                        Some(secs) => literal_number(secs),
                        None => "0".to_string(),
                    })
                }
                "detect_parallel_execution" => {
                    let threshold = arg_as_f64(args, 0).unwrap_or(0.0);
                    Ok(literal_bool(seq.detect_parallel_execution(threshold)))
                }
                other => Err(ExprError::UnknownHelper(format!("sequence.{other}"))),
            }
        }
        "query" => {
            let query = view.query();
            match method {
                "was_resolved" => Ok(literal_bool(query.was_resolved())),
                "get_execution_time" => Ok(literal_number(query.get_execution_time().unwrap_or(0.0))),
                "get_resolution_status" => Ok(literal_string(query.get_resolution_status())),
                "was_query_timeout" => {
                    let threshold = arg_as_f64(args, 0).unwrap_or(0.0);
                    Ok(literal_bool(query.was_query_timeout(threshold)))
                }
                other => Err(ExprError::UnknownHelper(format!("query.{other}"))),
            }
        }
        other => Err(ExprError::UnknownHelper(other.to_string())),
    }
}

/// Replace every recognized `entity.method(args)` call in `source` with
/// its literal evaluated result. Runs to a fixed point so that a
/// substitution yielding an expression fragment containing no further
/// calls is sufficient after one pass (calls never nest, §4.4).
pub fn substitute(source: &str, view: &EventView<'_>) -> Result<String, ExprError> {
    let pattern = call_pattern();
    let mut result = String::new();
    let mut last_end = 0;
    for caps in pattern.captures_iter(source) {
        let whole = caps.get(0).expect("group 0 always matches");
        result.push_str(&source[last_end..whole.start()]);
        let entity = &caps[1];
        let method = &caps[2];
        let raw_args = &caps[3];
        let attr = caps.get(4).map(|m| m.as_str());
        let args: Vec<ArgToken> = split_args(raw_args).iter().map(|a| parse_arg(a)).collect();
        let literal = dispatch(view, entity, method, &args, attr)?;
        result.push_str(&literal);
        last_end = whole.end();
    }
    result.push_str(&source[last_end..]);
    Ok(result)
}
