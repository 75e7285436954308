use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const SUBJECT_ID_KEYS: [&str; 4] = ["user_id", "sub", "subject_id", "id"];

/// Identity facts supplied with a single query. Trusted as-is and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationContext {
    subject_attributes: Map<String, Value>,
}

impl AuthorizationContext {
    pub fn new(subject_attributes: Map<String, Value>) -> Self {
        Self { subject_attributes }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            subject_attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.subject_attributes.insert(key.into(), value.into());
        self
    }

    pub fn subject_attributes(&self) -> &Map<String, Value> {
        &self.subject_attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.subject_attributes.get(key)
    }

    /// Identity used in audit records; `anonymous` when no id attribute is present.
    pub fn subject_id(&self) -> String {
        SUBJECT_ID_KEYS
            .iter()
            .find_map(|key| match self.subject_attributes.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "anonymous".to_string())
    }

    pub fn groups(&self) -> Vec<&str> {
        match self.subject_attributes.get("groups") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(single)) => vec![single.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn is_service_account(&self) -> bool {
        matches!(
            self.subject_attributes.get("is_service_account"),
            Some(Value::Bool(true))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_id_fallbacks() {
        let ctx = AuthorizationContext::from_pairs([("sub", "agent-7")]);
        assert_eq!(ctx.subject_id(), "agent-7");

        let ctx = AuthorizationContext::from_pairs([("user_id", "u1"), ("sub", "agent-7")]);
        assert_eq!(ctx.subject_id(), "u1");

        assert_eq!(AuthorizationContext::default().subject_id(), "anonymous");
    }

    #[test]
    fn test_groups_and_service_account() {
        let ctx = AuthorizationContext::default()
            .with_attribute("groups", json!(["group:a", "group:b", 3]))
            .with_attribute("is_service_account", true);

        assert_eq!(ctx.groups(), vec!["group:a", "group:b"]);
        assert!(ctx.is_service_account());

        let ctx = AuthorizationContext::default().with_attribute("is_service_account", "true");
        assert!(!ctx.is_service_account());
    }

    #[test]
    fn test_deserializes_from_plain_object() {
        let ctx: AuthorizationContext =
            serde_json::from_str(r#"{"user_id": "u1", "location": "US"}"#).unwrap();

        assert_eq!(ctx.attribute("location"), Some(&json!("US")));
    }
}
