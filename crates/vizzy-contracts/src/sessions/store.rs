use dashmap::DashMap;

use super::{ChatMessage, ConversationSession};
use crate::error::SessionError;

/// Session persistence seam for the HTTP layer.
///
/// Implementations must make `append` atomic per session id.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<ConversationSession>;

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns the existing session or registers an empty one under `id`.
    fn get_or_create(&self, id: &str) -> ConversationSession;

    /// Appends `messages` and records `theme` if it is new for the session.
    fn append(
        &self,
        id: &str,
        messages: Vec<ChatMessage>,
        theme: Option<&str>,
    ) -> Result<ConversationSession, SessionError>;
}

/// Volatile store: sessions live until the process exits.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, ConversationSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<ConversationSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    fn get_or_create(&self, id: &str) -> ConversationSession {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| ConversationSession::new(id))
            .value()
            .clone()
    }

    fn append(
        &self,
        id: &str,
        messages: Vec<ChatMessage>,
        theme: Option<&str>,
    ) -> Result<ConversationSession, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        let session = entry.value_mut();
        session.messages.extend(messages);
        if let Some(theme) = theme.map(str::trim).filter(|value| !value.is_empty()) {
            if !session.inferred_themes.contains(theme) {
                session.inferred_themes.insert(theme.to_string());
            }
        }
        Ok(session.clone())
    }
}
