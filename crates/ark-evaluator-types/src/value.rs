//! The `{value}` / `{valueFrom: secretKeyRef|configMapKeyRef}` shape used by
//! `Model` CRD fields (§4.1, §9 "Resource dereference").

use serde::{Deserialize, Serialize};

/// A reference to a single key inside a `Secret` or `ConfigMap`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRef {
    pub name: String,
    pub key: String,
}

/// Either an inline literal value or a reference into a Secret/ConfigMap.
///
/// If both `value` and `valueFrom` are present on the wire, `value` wins
/// (§8 "valueFrom precedence").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValueSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "valueFrom")]
    pub value_from: Option<ValueFrom>,
}

/// The two reference kinds a `valueFrom` may name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueFrom {
    #[serde(rename = "secretKeyRef")]
    SecretKeyRef(KeyRef),
    #[serde(rename = "configMapKeyRef")]
    ConfigMapKeyRef(KeyRef),
}

impl ValueSource {
    pub fn literal(value: impl Into<String>) -> Self {
        ValueSource {
            value: Some(value.into()),
            value_from: None,
        }
    }

    pub fn from_secret(name: impl Into<String>, key: impl Into<String>) -> Self {
        ValueSource {
            value: None,
            value_from: Some(ValueFrom::SecretKeyRef(KeyRef {
                name: name.into(),
                key: key.into(),
            })),
        }
    }

    pub fn from_config_map(name: impl Into<String>, key: impl Into<String>) -> Self {
        ValueSource {
            value: None,
            value_from: Some(ValueFrom::ConfigMapKeyRef(KeyRef {
                name: name.into(),
                key: key.into(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_inline_value() {
        let src: ValueSource = serde_json::from_str(r#"{"value": "gpt-4o"}"#).unwrap();
        assert_eq!(src.value.as_deref(), Some("gpt-4o"));
        assert!(src.value_from.is_none());
    }

    #[test]
    fn deserializes_secret_ref() {
        let src: ValueSource = serde_json::from_str(
            r#"{"valueFrom": {"secretKeyRef": {"name": "s", "key": "apiKey"}}}"#,
        )
        .unwrap();
        assert_eq!(
            src.value_from,
            Some(ValueFrom::SecretKeyRef(KeyRef {
                name: "s".into(),
                key: "apiKey".into()
            }))
        );
    }

    #[test]
    fn value_and_value_from_both_present_are_both_carried() {
        // Precedence (value wins) is a resolver-level concern (§8); the
        // wire type simply carries both fields through untouched.
        let src: ValueSource = serde_json::from_str(
            r#"{"value": "literal", "valueFrom": {"configMapKeyRef": {"name": "c", "key": "k"}}}"#,
        )
        .unwrap();
        assert_eq!(src.value.as_deref(), Some("literal"));
        assert!(src.value_from.is_some());
    }
}
