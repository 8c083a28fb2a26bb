mod store;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub use store::{InMemorySessionStore, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: None,
        }
    }

    pub fn assistant(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images: Some(images),
        }
    }
}

/// Conversation record held for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    /// Intent categories seen in this session, first occurrence order.
    pub inferred_themes: IndexSet<String>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
            inferred_themes: IndexSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn messages_serialize_with_lowercase_roles() -> anyhow::Result<()> {
        let user = serde_json::to_value(ChatMessage::user("hi"))?;
        assert_eq!(user, json!({"role": "user", "content": "hi", "images": null}));

        let assistant = serde_json::to_value(ChatMessage::assistant(
            "A quiet harbour.",
            vec!["https://img/1.webp".to_string()],
        ))?;
        assert_eq!(assistant["role"], Value::String("assistant".to_string()));
        assert_eq!(assistant["images"], json!(["https://img/1.webp"]));
        Ok(())
    }

    #[test]
    fn session_serializes_themes_as_list() -> anyhow::Result<()> {
        let mut session = ConversationSession::new("s-1");
        session.inferred_themes.insert("poster".to_string());
        session.inferred_themes.insert("chat".to_string());
        let value = serde_json::to_value(&session)?;
        assert_eq!(value["inferred_themes"], json!(["poster", "chat"]));
        assert!(value["created_at"].as_str().is_some());
        Ok(())
    }
}
