//! `/chat` and `/refine`: one conversational turn each.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vizzy_contracts::sessions::ChatMessage;

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

const DEFAULT_NUM_IMAGES: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/refine", post(refine))
}

fn default_num_images() -> usize {
    DEFAULT_NUM_IMAGES
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    /// `0` turns the request into a text-only chat turn.
    #[serde(default = "default_num_images")]
    pub num_images: usize,
    #[serde(default)]
    pub refinement: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub message: String,
    pub images: Vec<String>,
    pub copy: String,
    pub intent_category: String,
    pub conversation_history: Vec<ChatMessage>,
    pub llm_model: String,
    pub image_model: String,
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    run_turn(&state, request.session_id, request.message, request.num_images)
        .await
        .map(Json)
}

async fn refine(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Some(session_id) = request
        .session_id
        .filter(|id| state.sessions.contains(id))
    else {
        return Err(ApiError::not_found("Session not found"));
    };
    let message = format!(
        "{}. {}",
        request.message,
        request.refinement.unwrap_or_default()
    );
    run_turn(&state, Some(session_id), message, request.num_images)
        .await
        .map(Json)
}

async fn run_turn(
    state: &AppState,
    session_id: Option<String>,
    message: String,
    num_images: usize,
) -> Result<ChatResponse, ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state.sessions.get_or_create(&session_id);

    let turn = state.orchestrator.respond(&message, num_images).await;
    info!(
        session_id = %session_id,
        intent = %turn.intent_category,
        image_model = %turn.image_model,
        "Turn completed with {} images",
        turn.images.len()
    );

    let session = state.sessions.append(
        &session_id,
        vec![
            ChatMessage::user(message),
            ChatMessage::assistant(turn.reply.clone(), turn.images.clone()),
        ],
        Some(&turn.intent_category),
    )?;

    Ok(ChatResponse {
        session_id,
        message: turn.reply.clone(),
        images: turn.images,
        copy: turn.reply,
        intent_category: turn.intent_category,
        conversation_history: session.messages,
        llm_model: state.orchestrator.text_model().to_string(),
        image_model: turn.image_model,
    })
}
