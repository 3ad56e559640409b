//! Role-based classification and structural redaction of response payloads.
//!
//! A [`ContentPolicy`] is built once at start-up and shared read-only between
//! requests. It answers two questions about an outbound JSON payload:
//! - may this principal see the AI-derived fields in it ([`ContentPolicy::classify`])
//! - what does the payload look like with those fields removed ([`ContentPolicy::redact`])

use serde_json::{Map, Value};

use crate::domain::{AccessDecision, AuthorizedRoles, Principal, Role, SensitiveFieldSet};

/// Container nesting kept by the redactor; deeper containers become `null`.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// A payload with all sensitive keys removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Redaction {
    pub payload: Value,
    /// Removed key names, one entry per occurrence, in walk order.
    pub removed_keys: Vec<String>,
    /// Containers past the depth cap that were replaced by `null`.
    pub truncated: usize,
}

impl Redaction {
    pub fn removed_count(&self) -> usize {
        self.removed_keys.len()
    }
}

/// Immutable filtering policy shared by every request.
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    fields: SensitiveFieldSet,
    authorized_roles: AuthorizedRoles,
    max_depth: usize,
}

impl ContentPolicy {
    pub fn new(fields: SensitiveFieldSet, authorized_roles: AuthorizedRoles) -> Self {
        Self {
            fields,
            authorized_roles,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn fields(&self) -> &SensitiveFieldSet {
        &self.fields
    }

    pub fn authorized_roles(&self) -> &AuthorizedRoles {
        &self.authorized_roles
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_authorized(&self, role: Role) -> bool {
        self.authorized_roles.contains(role)
    }

    /// Sensitive patterns present in any key or string value of the payload.
    ///
    /// A pattern occurring inside a string value counts as a detection even
    /// though the redactor only removes keys.
    pub fn detect(&self, payload: &Value) -> Vec<String> {
        self.fields.find_in_value(payload)
    }

    /// Decide whether `payload` must be filtered before reaching `principal`.
    ///
    /// Authorized roles short-circuit without looking at the payload.
    pub fn classify(&self, principal: &Principal, payload: &Value) -> AccessDecision {
        if self.is_authorized(principal.role) {
            return AccessDecision::authorized();
        }

        let detected = self.detect(payload);
        if detected.is_empty() {
            AccessDecision::clean()
        } else {
            AccessDecision::filter(principal.role, detected)
        }
    }

    /// Build a copy of `payload` without any key matching the field set.
    ///
    /// Containers nested at or below `max_depth` are replaced by `null`, so
    /// sensitive keys above the cap are still removed from a deep payload.
    pub fn redact(&self, payload: &Value) -> Redaction {
        let mut redaction = Redaction {
            payload: Value::Null,
            removed_keys: Vec::new(),
            truncated: 0,
        };
        redaction.payload = self.redact_value(payload, 0, &mut redaction);
        redaction
    }

    fn redact_value(&self, value: &Value, depth: usize, out: &mut Redaction) -> Value {
        match value {
            Value::Array(_) | Value::Object(_) if depth >= self.max_depth => {
                out.truncated += 1;
                Value::Null
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.redact_value(item, depth + 1, out))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut cleaned = Map::new();
                for (key, child) in map {
                    if self.fields.matches_key(key) {
                        out.removed_keys.push(key.clone());
                        continue;
                    }
                    cleaned.insert(key.clone(), self.redact_value(child, depth + 1, out));
                }
                Value::Object(cleaned)
            }
            scalar => scalar.clone(),
        }
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self::new(SensitiveFieldSet::default(), AuthorizedRoles::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client() -> Principal {
        Principal::new("user-1", Role::Client)
    }

    #[test]
    fn test_authorized_role_ignores_payload() {
        let policy = ContentPolicy::default();
        let reader = Principal::new("reader-1", Role::Reader);
        let decision = policy
            .classify(&reader, &json!({"ai_interpretation": "x"}));
        assert_eq!(decision, AccessDecision::authorized());
    }

    #[test]
    fn test_unauthorized_with_ai_content_is_filtered() {
        let policy = ContentPolicy::default();
        let decision = policy
            .classify(&client(), &json!({"id": 1, "ai_interpretation": "x", "card": "Sun"}));
        assert!(decision.should_filter);
        assert_eq!(decision.reason.to_string(), "unauthorized_role_client");
        assert_eq!(
            decision.detected_fields,
            vec!["ai_interpretation".to_string(), "interpretation".to_string()]
        );
    }

    #[test]
    fn test_unauthorized_clean_payload_is_not_filtered() {
        let policy = ContentPolicy::default();
        let decision = policy.classify(&client(), &json!({"id": 1, "card": "Sun"}));
        assert_eq!(decision, AccessDecision::clean());
    }

    #[test]
    fn test_redact_removes_nested_keys() {
        let policy = ContentPolicy::default();
        let payload = json!({
            "readings": [{"ai_notes": "a"}, {"ai_notes": "b"}]
        });

        let redaction = policy.redact(&payload);

        assert_eq!(redaction.payload, json!({"readings": [{}, {}]}));
        assert_eq!(redaction.removed_keys, vec!["ai_notes", "ai_notes"]);
    }

    #[test]
    fn test_redact_drops_whole_subtree_of_sensitive_key() {
        let policy = ContentPolicy::default();
        let payload = json!({
            "session": {
                "id": 7,
                "ai_analysis": {"summary": "s", "cards": ["Moon"]},
                "reader_ai_notes": "n"
            }
        });

        let redaction = policy.redact(&payload);

        assert_eq!(redaction.payload, json!({"session": {"id": 7}}));
        assert_eq!(redaction.removed_count(), 2);
    }

    #[test]
    fn test_redact_leaves_input_untouched() {
        let policy = ContentPolicy::default();
        let payload = json!({"id": 1, "confidence_score": 0.8});
        let before = payload.clone();

        let _ = policy.redact(&payload);

        assert_eq!(payload, before);
    }

    #[test]
    fn test_redact_truncates_past_depth_cap() {
        let policy = ContentPolicy::default().with_max_depth(3);

        let shallow = policy.redact(&json!({"a": {"b": {"c": 1}}}));
        assert_eq!(shallow.truncated, 0);

        let deep = policy.redact(&json!({
            "ai_notes": "n",
            "a": {"b": {"c": {"d": 1}}, "list": [[1]]}
        }));
        assert_eq!(deep.payload, json!({"a": {"b": {"c": null}, "list": [null]}}));
        assert_eq!(deep.removed_keys, vec!["ai_notes"]);
        assert_eq!(deep.truncated, 2);
    }

    #[test]
    fn test_scalar_payload_passes_through() {
        let policy = ContentPolicy::default();
        let redaction = policy.redact(&json!("ai_notes"));
        assert_eq!(redaction.payload, json!("ai_notes"));
        assert!(redaction.removed_keys.is_empty());
    }
}
