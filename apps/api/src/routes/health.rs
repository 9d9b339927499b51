use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and generation settings.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "screener",
        "model": state.config.gemini_model,
        "response_format": state.contract.name(),
        "record_store": state.records.backend(),
        "active_sessions": state.sessions.len().await,
    }))
}
