use serde_json::Value;

use crate::error::{CoreError, Result};

/// Key patterns that identify AI-model output in response payloads.
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "ai_interpretation",
    "ai_reading",
    "ai_analysis",
    "ai_insights",
    "ai_notes",
    "ai_summary",
    "ai_suggestions",
    "ai_generated",
    "ai_confidence",
    "ai_model",
    "ai_prompt",
    "ai_response",
    "ai_metadata",
    "confidence_score",
    "model_version",
    "model_name",
    "prompt_tokens",
    "completion_tokens",
    "interpretation",
];

/// Ordered set of lowercase substring patterns matched against payload keys.
///
/// Matching is a plain substring test on the lowercased key, so `ai_notes`
/// also catches `reader_ai_notes` and `AI_Notes_v2`. Over-redaction of an
/// innocently named key is accepted in exchange for never leaking a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveFieldSet {
    patterns: Vec<String>,
}

impl SensitiveFieldSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().to_lowercase();
            if pattern.is_empty() {
                return Err(CoreError::InvalidPattern(
                    "pattern must not be empty".to_string(),
                ));
            }
            if !normalized.contains(&pattern) {
                normalized.push(pattern);
            }
        }

        if normalized.is_empty() {
            return Err(CoreError::InvalidPattern(
                "at least one pattern is required".to_string(),
            ));
        }

        Ok(Self {
            patterns: normalized,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a single payload key must be removed.
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// Patterns occurring in any key or string value of `value`, in set order.
    ///
    /// The walk uses an explicit stack, so nesting depth is not bounded here.
    pub fn find_in_value(&self, value: &Value) -> Vec<String> {
        let mut found = vec![false; self.patterns.len()];
        let mut pending = vec![value];

        while let Some(node) = pending.pop() {
            match node {
                Value::Object(map) => {
                    for (key, child) in map {
                        self.mark_matches(key, &mut found);
                        pending.push(child);
                    }
                }
                Value::Array(items) => pending.extend(items),
                Value::String(text) => self.mark_matches(text, &mut found),
                _ => {}
            }
            if found.iter().all(|hit| *hit) {
                break;
            }
        }

        self.patterns
            .iter()
            .zip(found)
            .filter(|(_, hit)| *hit)
            .map(|(pattern, _)| pattern.clone())
            .collect()
    }

    fn mark_matches(&self, text: &str, found: &mut [bool]) {
        let text = text.to_lowercase();
        for (pattern, hit) in self.patterns.iter().zip(found.iter_mut()) {
            if !*hit && text.contains(pattern.as_str()) {
                *hit = true;
            }
        }
    }
}

impl Default for SensitiveFieldSet {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}
