use axum::{extract::Request, http::HeaderValue, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn};

use crate::state::AppState;

/// Create the API router. `allowed_origins` is the raw comma-separated
/// `ALLOWED_ORIGINS` value; unset or `*` allows any origin.
pub fn create_router(state: AppState, allowed_origins: Option<&str>) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
        )
    });

    Router::new()
        .merge(crate::api::meta::router())
        .merge(crate::api::chat::router())
        .merge(crate::api::session::router())
        .layer(trace_layer)
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origin(allowed_origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn allowed_origin(raw: Option<&str>) -> AllowOrigin {
    let entries: Vec<&str> = raw
        .unwrap_or("*")
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    if entries.is_empty() || entries.contains(&"*") {
        return AllowOrigin::any();
    }
    let origins: Vec<HeaderValue> = entries
        .into_iter()
        .filter_map(|entry| match HeaderValue::from_str(entry) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid origin in ALLOWED_ORIGINS: {entry}");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}
