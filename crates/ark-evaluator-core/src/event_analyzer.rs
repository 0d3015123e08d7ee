//! Event Analyzer (C3, §4.3).
//!
//! Fetches Kubernetes events for a query/session and parses them into the
//! typed [`ParsedEvent`] stream the helper set (C4) and expression
//! evaluator (C5) operate over.

use k8s_openapi::api::core::v1::Event as K8sEvent;
use kube::api::{Api, ListParams};
use tracing::debug;

use ark_evaluator_types::{EventFilter, EventType, InvolvedObject, ParsedEvent, ParsedEventMetadata, Scope};

use crate::config::KubeClientMode;
use crate::error::ResolverError;
use crate::k8s_client;

/// Two recognized wrapper shapes for an event message body (§3, §4.3): a
/// `{"Metadata": {...}}` wrapper, or the metadata fields inline at the top
/// level.
fn parse_message_metadata(message: &str) -> Option<ParsedEventMetadata> {
    let value: serde_json::Value = serde_json::from_str(message).ok()?;
    if let Some(wrapped) = value.get("Metadata").or_else(|| value.get("metadata")) {
        serde_json::from_value(wrapped.clone()).ok()
    } else {
        serde_json::from_value(value).ok()
    }
}

fn parse_event(raw: K8sEvent) -> Option<ParsedEvent> {
    let metadata = raw.metadata;
    let name = metadata.name.unwrap_or_default();
    let namespace = metadata.namespace.unwrap_or_default();
    let reason = raw.reason.unwrap_or_default();
    let message = raw.message.unwrap_or_default();
    let event_type = EventType::from(raw.type_.as_deref().unwrap_or("Normal"));
    let involved = raw.involved_object;
    let involved_object = InvolvedObject {
        kind: involved.kind.unwrap_or_default(),
        name: involved.name.unwrap_or_default(),
        namespace: involved.namespace.unwrap_or_default(),
    };
    let count = raw.count.unwrap_or(1);
    let first_timestamp = raw.first_timestamp.map(|t| t.0);
    let last_timestamp = raw.last_timestamp.map(|t| t.0);
    let parsed_metadata = parse_message_metadata(&message);

    Some(ParsedEvent {
        name,
        namespace,
        reason,
        message,
        first_timestamp,
        last_timestamp,
        count,
        event_type,
        involved_object,
        metadata: parsed_metadata,
    })
}

/// Fetches and parses Kubernetes events for a query, applying scope
/// semantics (§4.3).
pub struct EventAnalyzer {
    client: Option<kube::Client>,
    namespace: String,
    query_name: Option<String>,
    session_id: Option<String>,
}

impl EventAnalyzer {
    pub async fn new(
        mode: KubeClientMode,
        namespace: impl Into<String>,
        query_name: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        EventAnalyzer {
            client: k8s_client::client(mode).await,
            namespace: namespace.into(),
            query_name,
            session_id,
        }
    }

    /// `current` (default) is an alias of `session` when a session ID was
    /// given, otherwise `query` (§4.3).
    fn resolve_scope(&self, scope: Scope) -> Scope {
        match scope {
            Scope::Current => {
                if self.session_id.is_some() {
                    Scope::Session
                } else {
                    Scope::Query
                }
            }
            other => other,
        }
    }

    fn scope_matches(&self, scope: Scope, event: &ParsedEvent) -> bool {
        match scope {
            Scope::All => true,
            Scope::Query => match &self.query_name {
                Some(name) => {
                    event.involved_object.kind == "Query" && &event.involved_object.name == name
                }
                None => true,
            },
            Scope::Session => {
                let query_ok = match &self.query_name {
                    Some(name) => {
                        event.involved_object.kind == "Query" && &event.involved_object.name == name
                    }
                    None => true,
                };
                if !query_ok {
                    return false;
                }
                match &self.session_id {
                    Some(sid) => event.session_id() == Some(sid.as_str()),
                    None => true,
                }
            }
            Scope::Current => unreachable!("resolve_scope eliminates Current"),
        }
    }

    /// Fetch events for the given scope, optionally narrowed by a
    /// [`EventFilter`] and truncated to `limit`, sorted newest-first
    /// (§4.3).
    pub async fn get_events(
        &self,
        scope: Scope,
        filter: Option<&EventFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<ParsedEvent>, ResolverError> {
        let Some(client) = &self.client else {
            return Ok(Vec::new());
        };
        let api: Api<K8sEvent> = Api::namespaced(client.clone(), &self.namespace);
        let raw_events = match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(kube::Error::Api(ae)) if ae.code == 403 => {
                return Err(ResolverError::Forbidden {
                    kind: "Event".into(),
                    name: self.namespace.clone(),
                })
            }
            Err(e) => return Err(ResolverError::Kube(e)),
        };

        let resolved_scope = self.resolve_scope(scope);
        let mut events: Vec<ParsedEvent> = raw_events
            .into_iter()
            .filter_map(parse_event)
            .filter(|e| self.scope_matches(resolved_scope, e))
            .filter(|e| filter.is_none_or(|f| f.matches(e)))
            .collect();

        events.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        debug!(count = events.len(), ?resolved_scope, "fetched events");
        Ok(events)
    }

    pub async fn get_tool_events(&self, scope: Scope) -> Result<Vec<ParsedEvent>, ResolverError> {
        let filter = EventFilter {
            reasons: vec![
                "ToolCallStart".into(),
                "ToolCallComplete".into(),
                "ToolCallError".into(),
            ],
            ..Default::default()
        };
        self.get_events(scope, Some(&filter), None).await
    }

    pub async fn get_agent_events(&self, scope: Scope) -> Result<Vec<ParsedEvent>, ResolverError> {
        let filter = EventFilter {
            reasons: vec![
                "AgentExecutionStart".into(),
                "AgentExecutionComplete".into(),
                "AgentExecutionError".into(),
            ],
            ..Default::default()
        };
        self.get_events(scope, Some(&filter), None).await
    }

    pub async fn get_team_events(&self, scope: Scope) -> Result<Vec<ParsedEvent>, ResolverError> {
        let filter = EventFilter {
            reasons: vec![
                "TeamExecutionStart".into(),
                "TeamExecutionComplete".into(),
                "TeamMember".into(),
            ],
            ..Default::default()
        };
        self.get_events(scope, Some(&filter), None).await
    }

    pub async fn get_llm_events(&self, scope: Scope) -> Result<Vec<ParsedEvent>, ResolverError> {
        let filter = EventFilter {
            reasons: vec!["LLMCallStart".into(), "LLMCallComplete".into()],
            ..Default::default()
        };
        self.get_events(scope, Some(&filter), None).await
    }

    pub async fn get_error_events(&self, scope: Scope) -> Result<Vec<ParsedEvent>, ResolverError> {
        let filter = EventFilter {
            has_errors: Some(true),
            ..Default::default()
        };
        self.get_events(scope, Some(&filter), None).await
    }

    pub async fn count_events_by_type(
        &self,
        scope: Scope,
    ) -> Result<std::collections::HashMap<String, usize>, ResolverError> {
        let events = self.get_events(scope, None, None).await?;
        let mut counts = std::collections::HashMap::new();
        for event in &events {
            *counts.entry(event.reason.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_evaluator_types::ParsedEventMetadata;
    use chrono::Utc;

    fn sample_event(reason: &str, kind: &str, name: &str) -> ParsedEvent {
        ParsedEvent {
            name: format!("{reason}-evt"),
            namespace: "default".into(),
            reason: reason.into(),
            message: String::new(),
            first_timestamp: Some(Utc::now()),
            last_timestamp: Some(Utc::now()),
            count: 1,
            event_type: EventType::Normal,
            involved_object: InvolvedObject {
                kind: kind.into(),
                name: name.into(),
                namespace: "default".into(),
            },
            metadata: None,
        }
    }

    #[test]
    fn message_metadata_accepts_wrapper_shape() {
        let msg = r#"{"Metadata": {"sessionId": "s1", "toolName": "search"}}"#;
        let meta = parse_message_metadata(msg).unwrap();
        assert_eq!(meta.session_id.as_deref(), Some("s1"));
        assert_eq!(meta.tool_name.as_deref(), Some("search"));
    }

    #[test]
    fn message_metadata_accepts_inline_shape() {
        let msg = r#"{"sessionId": "s1", "toolName": "search"}"#;
        let meta = parse_message_metadata(msg).unwrap();
        assert_eq!(meta.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn message_metadata_is_none_for_free_text() {
        assert!(parse_message_metadata("not json at all").is_none());
    }

    #[test]
    fn scope_resolution_current_aliases_session_when_session_set() {
        let analyzer = EventAnalyzer {
            client: None,
            namespace: "default".into(),
            query_name: Some("q1".into()),
            session_id: Some("s1".into()),
        };
        assert_eq!(analyzer.resolve_scope(Scope::Current), Scope::Session);
    }

    #[test]
    fn scope_resolution_current_aliases_query_without_session() {
        let analyzer = EventAnalyzer {
            client: None,
            namespace: "default".into(),
            query_name: Some("q1".into()),
            session_id: None,
        };
        assert_eq!(analyzer.resolve_scope(Scope::Current), Scope::Query);
    }

    #[test]
    fn scope_query_matches_only_named_query_object() {
        let analyzer = EventAnalyzer {
            client: None,
            namespace: "default".into(),
            query_name: Some("q1".into()),
            session_id: None,
        };
        let matching = sample_event("ToolCallStart", "Query", "q1");
        let other = sample_event("ToolCallStart", "Query", "q2");
        assert!(analyzer.scope_matches(Scope::Query, &matching));
        assert!(!analyzer.scope_matches(Scope::Query, &other));
    }

    #[test]
    fn scope_session_requires_matching_session_id() {
        let analyzer = EventAnalyzer {
            client: None,
            namespace: "default".into(),
            query_name: Some("q1".into()),
            session_id: Some("s1".into()),
        };
        let mut matching = sample_event("ToolCallStart", "Query", "q1");
        matching.metadata = Some(ParsedEventMetadata {
            session_id: Some("s1".into()),
            ..Default::default()
        });
        let mut other = sample_event("ToolCallStart", "Query", "q1");
        other.metadata = Some(ParsedEventMetadata {
            session_id: Some("other".into()),
            ..Default::default()
        });
        assert!(analyzer.scope_matches(Scope::Session, &matching));
        assert!(!analyzer.scope_matches(Scope::Session, &other));
    }
}
