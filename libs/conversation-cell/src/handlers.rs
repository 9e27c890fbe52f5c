use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{ChatRequest, TurnOutcome};
use crate::ChatState;

#[axum::debug_handler]
pub async fn chat_turn(
    State(state): State<Arc<ChatState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    if request.session_id.trim().is_empty() {
        return Err(AppError::BadRequest("session_id must not be empty".to_string()));
    }
    if request.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    // The lock is held for the whole turn so concurrent messages for the
    // same session are serialized rather than clobbering each other.
    let slot = state.sessions.session(&request.session_id);
    let mut session = slot.lock().await;
    state.sessions.expire_if_idle(&mut session);
    debug!(
        "session {} turn at stage {}",
        session.session_id, session.stage
    );

    let outcome = state.engine.handle_turn(&mut session, &request.message).await;

    Ok(Json(outcome))
}
