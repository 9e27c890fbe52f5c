use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::ChatState;

pub fn chat_routes(state: Arc<ChatState>) -> Router {
    Router::new()
        .route("/", post(handlers::chat_turn))
        .with_state(state)
}
