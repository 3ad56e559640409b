use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::{json, Value};
use tarot_guard_core::{AuthorizedRoles, ContentPolicy, Principal, Role, SensitiveFieldSet};

// ===== Helpers =====

fn collect_keys(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                keys.push(key.clone());
                collect_keys(child, keys);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_keys(item, keys)),
        _ => {}
    }
}

/// Asserts `redacted` is `original` minus sensitive keys, with every kept node
/// having the same JSON type.
fn assert_structure_preserved(fields: &SensitiveFieldSet, original: &Value, redacted: &Value) {
    match (original, redacted) {
        (Value::Object(before), Value::Object(after)) => {
            let kept: Vec<&String> = before.keys().filter(|k| !fields.matches_key(k)).collect();
            let after_keys: Vec<&String> = after.keys().collect();
            assert_eq!(kept, after_keys);
            for key in kept {
                assert_structure_preserved(fields, &before[key.as_str()], &after[key.as_str()]);
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            assert_eq!(before.len(), after.len());
            for (b, a) in before.iter().zip(after) {
                assert_structure_preserved(fields, b, a);
            }
        }
        (before, after) => assert_eq!(before, after),
    }
}

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        Just("ai_notes".to_string()),
        Just("AI_Interpretation".to_string()),
        Just("reader_ai_notes".to_string()),
        Just("confidence_score".to_string()),
        Just("model_version".to_string()),
        Just("card".to_string()),
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z _]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(6, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(arb_key(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Client),
        Just(Role::Reader),
        Just(Role::Admin),
        Just(Role::SuperAdmin),
        Just(Role::Anonymous),
    ]
}

// ===== Scenario Tests =====

#[test]
fn test_client_loses_ai_interpretation() {
    let policy = ContentPolicy::default();
    let principal = Principal::new("client-9", Role::Client);
    let payload = json!({"id": 1, "ai_interpretation": "x", "card": "Sun"});

    let decision = policy.classify(&principal, &payload);
    assert!(decision.should_filter);

    let redaction = policy.redact(&payload);
    assert_eq!(redaction.payload, json!({"id": 1, "card": "Sun"}));
    assert_eq!(redaction.removed_count(), 1);
}

#[test]
fn test_custom_policy_substitution() {
    let fields = SensitiveFieldSet::new(["oracle_"]).unwrap();
    let policy = ContentPolicy::new(fields, AuthorizedRoles::new([Role::SuperAdmin]));

    let admin = Principal::new("admin-1", Role::Admin);
    let payload = json!({"oracle_text": "t", "ai_notes": "kept under this policy"});

    let decision = policy.classify(&admin, &payload);
    assert_eq!(decision.detected_fields, vec!["oracle_".to_string()]);

    let redaction = policy.redact(&payload);
    assert_eq!(redaction.payload, json!({"ai_notes": "kept under this policy"}));
}

#[rstest]
#[case(Role::Reader, false)]
#[case(Role::Admin, false)]
#[case(Role::SuperAdmin, false)]
#[case(Role::Client, true)]
#[case(Role::Anonymous, true)]
fn test_filtering_by_role(#[case] role: Role, #[case] expect_filter: bool) {
    let policy = ContentPolicy::default();
    let principal = Principal::new("p", role);
    let decision = policy.classify(&principal, &json!({"session": {"model_version": "v3"}}));
    assert_eq!(decision.should_filter, expect_filter);
}

#[test]
fn test_value_only_match_is_detected_but_nothing_removed() {
    let policy = ContentPolicy::default();
    let principal = Principal::new("client-2", Role::Client);
    let payload = json!({"note": "please skip the interpretation today"});

    let decision = policy.classify(&principal, &payload);
    assert!(decision.should_filter);

    let redaction = policy.redact(&payload);
    assert_eq!(redaction.payload, payload);
    assert!(redaction.removed_keys.is_empty());
}

#[test]
fn test_pattern_with_quote_is_detected_and_removed() {
    let fields = SensitiveFieldSet::new([r#"oracle"raw"#]).unwrap();
    let policy = ContentPolicy::new(fields, AuthorizedRoles::default());
    let principal = Principal::new("client-3", Role::Client);
    let payload = json!({"id": 4, "oracle\"raw_text": "t"});

    let decision = policy.classify(&principal, &payload);
    assert!(decision.should_filter);

    let redaction = policy.redact(&payload);
    assert_eq!(redaction.payload, json!({"id": 4}));
    assert_eq!(redaction.removed_keys, vec![r#"oracle"raw_text"#.to_string()]);
}

#[test]
fn test_deep_sibling_does_not_shield_top_level_keys() {
    let policy = ContentPolicy::default();
    let mut deep = json!({"leaf": true});
    for _ in 0..55 {
        deep = json!({"next": deep});
    }
    let payload = json!({"id": 1, "ai_interpretation": "secret", "history": deep});

    let redaction = policy.redact(&payload);

    assert_eq!(redaction.removed_keys, vec!["ai_interpretation".to_string()]);
    assert_eq!(redaction.truncated, 1);
    assert_eq!(redaction.payload["id"], json!(1));
    assert!(redaction.payload.get("ai_interpretation").is_none());
}

// ===== Property-based Tests =====

proptest! {
    #[test]
    fn prop_authorized_roles_never_filtered(payload in arb_json()) {
        let policy = ContentPolicy::default();
        for role in [Role::Reader, Role::Admin, Role::SuperAdmin] {
            let decision = policy.classify(&Principal::new("p", role), &payload);
            prop_assert!(!decision.should_filter);
        }
    }

    #[test]
    fn prop_redacted_payload_has_no_sensitive_keys(payload in arb_json(), role in arb_role()) {
        let policy = ContentPolicy::default();
        let principal = Principal::new("p", role);
        let decision = policy.classify(&principal, &payload);

        let delivered = if decision.should_filter {
            policy.redact(&payload).payload
        } else {
            payload.clone()
        };

        if !policy.is_authorized(role) {
            let mut keys = Vec::new();
            collect_keys(&delivered, &mut keys);
            prop_assert!(keys.iter().all(|k| !policy.fields().matches_key(k)));
        }
    }

    #[test]
    fn prop_redaction_preserves_structure(payload in arb_json()) {
        let policy = ContentPolicy::default();
        let redaction = policy.redact(&payload);
        assert_structure_preserved(policy.fields(), &payload, &redaction.payload);
    }

    #[test]
    fn prop_redaction_is_idempotent(payload in arb_json()) {
        let policy = ContentPolicy::default();
        let once = policy.redact(&payload);
        let twice = policy.redact(&once.payload);
        prop_assert_eq!(&twice.payload, &once.payload);
        prop_assert!(twice.removed_keys.is_empty());
    }
}
