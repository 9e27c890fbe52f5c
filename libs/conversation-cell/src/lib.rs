pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

pub use models::{
    ChatRequest, CollectedFields, Extraction, ExtractionContext, ExtractionError, Intent,
    SessionState, Stage, TurnOutcome,
};
pub use services::engine::ConversationEngine;
pub use services::extractor::{IntentExtractor, OpenAiIntentExtractor};
pub use services::session::SessionManager;

/// Shared handler state for the chat route.
pub struct ChatState {
    pub engine: Arc<ConversationEngine>,
    pub sessions: Arc<SessionManager>,
}
