use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;

use crate::models::{Booking, BookingError, BookingStatus, InsertOutcome};
use crate::services::availability::AvailabilityService;
use crate::services::store::BookingStore;

/// Validates a chosen slot against current store contents and persists the
/// booking. The availability re-check runs immediately before the insert to
/// close the window between slot display and user confirmation; the insert
/// itself is the authoritative arbiter when two commits race.
pub struct BookingCommitter {
    store: Arc<dyn BookingStore>,
    availability: AvailabilityService,
}

impl BookingCommitter {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        let availability = AvailabilityService::new(Arc::clone(&store));
        Self { store, availability }
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    pub async fn commit(
        &self,
        patient_name: &str,
        doctor: &Doctor,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<Booking, BookingError> {
        let slots = self.availability.compute_slots(doctor, date).await?;

        if !slots.iter().any(|s| s.start_time == start_time) {
            // A grid member that is merely occupied is a conflict; anything
            // else (off-day, misaligned, outside working hours) was never a
            // bookable slot.
            let on_grid = !doctor.is_off_on(date)
                && doctor_cell::slot_grid(doctor).contains(&start_time);
            if on_grid {
                warn!(
                    "slot {} {} for {} taken between display and commit",
                    date, start_time, doctor.name
                );
                return Err(BookingError::SlotConflict);
            }
            return Err(BookingError::InvalidSlot(format!(
                "{} {} is not a bookable slot for {}",
                date, start_time, doctor.name
            )));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            patient_name: patient_name.to_string(),
            doctor_id: doctor.id,
            doctor_name: doctor.name.clone(),
            date,
            start_time,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };

        match self
            .store
            .insert_booking(booking.clone())
            .await
            .map_err(|e| BookingError::Storage(e.to_string()))?
        {
            InsertOutcome::Inserted => {
                info!(
                    "booking {} confirmed: {} with {} on {} at {}",
                    booking.id, booking.patient_name, booking.doctor_name, date, start_time
                );
                Ok(booking)
            }
            InsertOutcome::Conflict => {
                warn!(
                    "lost insert race for {} {} with {}",
                    date, start_time, doctor.name
                );
                Err(BookingError::SlotConflict)
            }
        }
    }

    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let cancelled = self
            .store
            .cancel_booking(booking_id)
            .await
            .map_err(|e| BookingError::Storage(e.to_string()))?
            .ok_or(BookingError::NotFound)?;

        info!("booking {} cancelled", booking_id);
        Ok(cancelled)
    }
}
