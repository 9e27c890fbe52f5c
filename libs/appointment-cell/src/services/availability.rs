use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::debug;

use doctor_cell::models::{AvailabilityError, Doctor, Slot};

use crate::models::BookingError;
use crate::services::store::BookingStore;

/// Availability over live store contents: the pure slot grid from
/// doctor-cell minus every start time held by an active booking. Read-only;
/// the commit-time check in the committer is what carries authority.
pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn compute_slots(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, BookingError> {
        let booked = self.booked_start_times(doctor, date).await?;
        let today = Utc::now().date_naive();

        doctor_cell::compute_slots(doctor, date, today, &booked).map_err(|e| match e {
            AvailabilityError::InvalidDate(msg) => BookingError::InvalidSlot(msg),
        })
    }

    pub(crate) async fn booked_start_times(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, BookingError> {
        let active = self
            .store
            .list_active_bookings(doctor.id, date)
            .await
            .map_err(|e| BookingError::Storage(e.to_string()))?;

        debug!(
            "{} active bookings for {} on {}",
            active.len(),
            doctor.name,
            date
        );
        Ok(active.into_iter().map(|b| b.start_time).collect())
    }
}
