use serde_json::{Map, Value};

pub const DEFAULT_INTENT_CATEGORY: &str = "creative";
pub const CHAT_INTENT_CATEGORY: &str = "chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentClassification {
    pub category: String,
    pub rewritten_prompt: String,
}

impl IntentClassification {
    /// Used whenever the classifier reply cannot be trusted.
    pub fn fallback(message: &str) -> Self {
        Self {
            category: DEFAULT_INTENT_CATEGORY.to_string(),
            rewritten_prompt: message.to_string(),
        }
    }

    pub fn chat(message: &str) -> Self {
        Self {
            category: CHAT_INTENT_CATEGORY.to_string(),
            rewritten_prompt: message.to_string(),
        }
    }
}

/// Best-effort parse of a classifier reply of the form `{"intent": .., "prompt": ..}`.
///
/// The first `{` through the last `}` is taken as the payload. Anything that
/// does not parse, or a missing or blank key, falls back to `"creative"` and
/// the original message.
pub fn parse_intent_payload(text: &str, original: &str) -> IntentClassification {
    let Some(payload) = extract_json_object_from_text(text) else {
        return IntentClassification::fallback(original);
    };
    IntentClassification {
        category: non_empty_str(&payload, "intent")
            .unwrap_or(DEFAULT_INTENT_CATEGORY)
            .to_string(),
        rewritten_prompt: non_empty_str(&payload, "prompt")
            .unwrap_or(original)
            .to_string(),
    }
}

fn non_empty_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn strip_code_fence(text: &str) -> &str {
    let raw = text.trim();
    if !(raw.starts_with("```") && raw.ends_with("```")) || raw.len() < 6 {
        return raw;
    }
    let inner = &raw[3..raw.len() - 3];
    let inner = inner.trim_start();
    inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner)
        .trim()
}

fn extract_json_object_from_text(text: &str) -> Option<Map<String, Value>> {
    let raw = strip_code_fence(text);
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}
