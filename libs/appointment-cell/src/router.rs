use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::BookingCellState;

pub fn booking_routes(state: Arc<BookingCellState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_booking))
        .route("/", get(handlers::list_bookings))
        .route("/patient/{patient_name}", get(handlers::get_patient_bookings))
        .route("/{booking_id}", delete(handlers::cancel_booking))
        .with_state(state)
}

/// Mounted at the root so the availability endpoint can live under the
/// /doctors prefix while still reaching the booking store.
pub fn availability_routes(state: Arc<BookingCellState>) -> Router {
    Router::new()
        .route(
            "/doctors/{doctor_name}/availability/{date}",
            get(handlers::get_doctor_availability),
        )
        .with_state(state)
}
