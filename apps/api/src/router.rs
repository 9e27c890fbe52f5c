use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{availability_routes, booking_routes};
use appointment_cell::{BookingCellState, BookingCommitter, InMemoryBookingStore};
use conversation_cell::router::chat_routes;
use conversation_cell::{ChatState, ConversationEngine, SessionManager};
use doctor_cell::router::doctor_routes;
use doctor_cell::{DoctorCellState, InMemoryDoctorRegistry};

pub fn create_router(
    registry: Arc<InMemoryDoctorRegistry>,
    store: Arc<InMemoryBookingStore>,
    committer: Arc<BookingCommitter>,
    engine: Arc<ConversationEngine>,
    sessions: Arc<SessionManager>,
) -> Router {
    let doctor_state = Arc::new(DoctorCellState {
        registry: registry.clone(),
    });
    let booking_state = Arc::new(BookingCellState {
        registry,
        store,
        committer,
    });
    let chat_state = Arc::new(ChatState { engine, sessions });

    Router::new()
        .route(
            "/",
            get(|| async { "Hospital booking assistant API is running!" }),
        )
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/bookings", booking_routes(booking_state.clone()))
        .nest("/chat", chat_routes(chat_state))
        .merge(availability_routes(booking_state))
}
