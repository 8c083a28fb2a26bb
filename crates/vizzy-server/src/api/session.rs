use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use vizzy_contracts::sessions::ChatMessage;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/session/{session_id}", get(get_session))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub inferred_themes: IndexSet<String>,
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(SessionResponse {
        session_id: session.id,
        created_at: session.created_at,
        messages: session.messages,
        inferred_themes: session.inferred_themes,
    }))
}
