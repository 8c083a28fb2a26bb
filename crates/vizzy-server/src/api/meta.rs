//! Service banner and credential-presence health report.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub const APP_NAME: &str = "Vizzy Chat Backend";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct ImageBackendStatus {
    pub huggingface: bool,
    pub replicate: bool,
    pub openrouter: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub text_backend_configured: bool,
    pub image_backends: ImageBackendStatus,
}

async fn root() -> Json<Value> {
    Json(json!({
        "app": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /chat": "Send a message and get generated images + copy",
            "POST /refine": "Refine the previous request of an existing session",
            "GET /session/{session_id}": "Retrieve session history",
            "GET /health": "Report which backends have credentials",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.config.as_ref();
    Json(HealthResponse {
        status: "ok",
        text_backend_configured: config.text_configured(),
        image_backends: ImageBackendStatus {
            huggingface: config.huggingface_api_key.is_some(),
            replicate: config.replicate_api_key.is_some(),
            openrouter: config.openrouter_api_key.is_some(),
        },
    })
}
