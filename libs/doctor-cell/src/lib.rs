pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use services::registry::DoctorRegistry;

pub use models::{AvailabilityError, Doctor, Slot};
pub use services::availability::{compute_slots, slot_grid};
pub use services::registry::InMemoryDoctorRegistry;

/// Shared handler state for the doctor routes.
pub struct DoctorCellState {
    pub registry: Arc<dyn DoctorRegistry>,
}
