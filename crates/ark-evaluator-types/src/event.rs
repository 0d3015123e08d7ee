//! Parsed Kubernetes events and the scope/filter vocabulary used to query
//! them (§3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scope used to narrow the event stream before filtering (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Query,
    Session,
    #[default]
    Current,
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Scope::All),
            "query" => Ok(Scope::Query),
            "session" => Ok(Scope::Session),
            "current" | "" => Ok(Scope::Current),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// Kubernetes event `type` field (`Normal` or `Warning`); anything else is
/// carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
    Other(String),
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "Normal" => EventType::Normal,
            "Warning" => EventType::Warning,
            other => EventType::Other(other.to_string()),
        }
    }
}

/// Reference to the Kubernetes object an event is about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Metadata decoded from an event's JSON message body, when present (§3).
///
/// Two wire shapes are recognized before this struct is populated: a
/// `{"Metadata": {...}}` wrapper, or the fields inline at the top level of
/// the message JSON. `parameters` is sometimes itself a JSON-encoded string
/// (double-encoded) rather than an object; callers that need the nested
/// parameters re-parse `parameters_raw` in that case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedEventMetadata {
    #[serde(default, rename = "queryId")]
    pub query_id: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, rename = "agentName")]
    pub agent_name: Option<String>,
    #[serde(default, rename = "teamName")]
    pub team_name: Option<String>,
    #[serde(default, rename = "toolName")]
    pub tool_name: Option<String>,
    #[serde(default, rename = "modelName")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Raw JSON value for `parameters`; may be an object or a JSON-encoded
    /// string that must be re-parsed (double-encoding, §3).
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default, rename = "promptTokens")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, rename = "completionTokens")]
    pub completion_tokens: Option<u64>,
}

impl ParsedEventMetadata {
    /// Return `parameters` as a JSON object, re-parsing it if it arrived as
    /// a JSON-encoded string (double-encoded, §3).
    pub fn parameters_object(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        match self.parameters.as_ref()? {
            serde_json::Value::Object(map) => Some(map.clone()),
            serde_json::Value::String(s) => match serde_json::from_str(s) {
                Ok(serde_json::Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A single Kubernetes event, parsed and (opportunistically) enriched with
/// structured metadata decoded from its message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub name: String,
    pub namespace: String,
    pub reason: String,
    pub message: String,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_count")]
    pub count: i32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub involved_object: InvolvedObject,
    pub metadata: Option<ParsedEventMetadata>,
}

fn default_count() -> i32 {
    1
}

impl ParsedEvent {
    /// Sort key used for newest-first ordering: `(lastTimestamp,
    /// firstTimestamp)`, descending.
    pub fn sort_key(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        (
            self.last_timestamp.unwrap_or(epoch),
            self.first_timestamp.unwrap_or(epoch),
        )
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.session_id.as_deref()
    }

    pub fn is_start(&self) -> bool {
        self.reason.ends_with("Start")
    }

    pub fn is_complete(&self) -> bool {
        self.reason.ends_with("Complete")
    }

    pub fn is_error(&self) -> bool {
        self.reason.ends_with("Error") || matches!(self.event_type, EventType::Warning)
    }
}

/// Combinator used to narrow a [`ParsedEvent`] stream beyond scope alone
/// (§3).
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub reasons: Vec<String>,
    pub components: Vec<String>,
    pub agents: Vec<String>,
    pub tools: Vec<String>,
    pub session_ids: Vec<String>,
    pub query_ids: Vec<String>,
    pub has_errors: Option<bool>,
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl EventFilter {
    pub fn matches(&self, event: &ParsedEvent) -> bool {
        if !self.reasons.is_empty() && !self.reasons.iter().any(|r| r == &event.reason) {
            return false;
        }
        let meta = event.metadata.as_ref();
        if !self.components.is_empty() {
            let component = meta.and_then(|m| m.component.as_deref());
            if !component.is_some_and(|c| self.components.iter().any(|x| x == c)) {
                return false;
            }
        }
        if !self.agents.is_empty() {
            let agent = meta.and_then(|m| m.agent_name.as_deref());
            if !agent.is_some_and(|a| self.agents.iter().any(|x| x == a)) {
                return false;
            }
        }
        if !self.tools.is_empty() {
            let tool = meta.and_then(|m| m.tool_name.as_deref());
            if !tool.is_some_and(|t| self.tools.iter().any(|x| x == t)) {
                return false;
            }
        }
        if !self.session_ids.is_empty() {
            let session = meta.and_then(|m| m.session_id.as_deref());
            if !session.is_some_and(|s| self.session_ids.iter().any(|x| x == s)) {
                return false;
            }
        }
        if !self.query_ids.is_empty() {
            let query_id = meta.and_then(|m| m.query_id.as_deref());
            if !query_id.is_some_and(|q| self.query_ids.iter().any(|x| x == q)) {
                return false;
            }
        }
        if let Some(expect_errors) = self.has_errors
            && event.is_error() != expect_errors
        {
            return false;
        }
        if self.min_duration.is_some() || self.max_duration.is_some() {
            let duration = meta
                .and_then(|m| m.duration.as_deref())
                .and_then(crate::duration::parse_duration);
            match duration {
                None => return false,
                Some(d) => {
                    if let Some(min) = self.min_duration
                        && d < min
                    {
                        return false;
                    }
                    if let Some(max) = self.max_duration
                        && d > max
                    {
                        return false;
                    }
                }
            }
        }
        if let Some((start, end)) = self.time_range {
            let ts = event.last_timestamp.or(event.first_timestamp);
            match ts {
                None => return false,
                Some(ts) => {
                    if ts < start || ts > end {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventCounts(pub HashMap<String, usize>);
