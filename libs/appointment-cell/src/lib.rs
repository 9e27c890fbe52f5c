pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use doctor_cell::services::registry::DoctorRegistry;

pub use models::{Booking, BookingError, BookingStatus, InsertOutcome};
pub use services::availability::AvailabilityService;
pub use services::committer::BookingCommitter;
pub use services::store::{BookingStore, InMemoryBookingStore};

/// Shared handler state for the booking routes.
pub struct BookingCellState {
    pub registry: Arc<dyn DoctorRegistry>,
    pub store: Arc<dyn BookingStore>,
    pub committer: Arc<BookingCommitter>,
}
