use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, InsertOutcome};

/// Persistence capability for bookings. Always injected; components never
/// reach storage through ambient state. The store owns the serialization
/// point for the unique (doctor, date, start_time) constraint: concurrent
/// inserts for the same key resolve to exactly one `Inserted`.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-cancelled bookings for a doctor on a date, ascending by start time.
    async fn list_active_bookings(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>>;

    /// Atomic insert: fails with `Conflict` when an active booking already
    /// holds the same (doctor, date, start_time). Never partially applies.
    async fn insert_booking(&self, booking: Booking) -> Result<InsertOutcome>;

    /// Flips a booking to cancelled, freeing its slot. `None` if unknown.
    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Option<Booking>>;

    async fn bookings_for_patient(&self, patient_name: &str) -> Result<Vec<Booking>>;

    async fn all_bookings(&self) -> Result<Vec<Booking>>;
}

/// Reference store used by the demo binary and every unit test. A single
/// mutex guards the whole booking list, so the check-then-insert inside
/// `insert_booking` is atomic.
pub struct InMemoryBookingStore {
    bookings: Mutex<Vec<Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            bookings: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn list_active_bookings(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Booking>> {
        let bookings = self.bookings.lock().expect("booking store poisoned");
        let mut active: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.doctor_id == doctor_id && b.date == date && b.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|b| b.start_time);
        Ok(active)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<InsertOutcome> {
        let mut bookings = self.bookings.lock().expect("booking store poisoned");

        let taken = bookings
            .iter()
            .any(|b| b.is_active() && b.slot_key() == booking.slot_key());
        if taken {
            debug!(
                "insert rejected, slot {} {} already held for doctor {}",
                booking.date, booking.start_time, booking.doctor_name
            );
            return Ok(InsertOutcome::Conflict);
        }

        bookings.push(booking);
        Ok(InsertOutcome::Inserted)
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        let mut bookings = self.bookings.lock().expect("booking store poisoned");
        for booking in bookings.iter_mut() {
            if booking.id == booking_id {
                booking.status = BookingStatus::Cancelled;
                return Ok(Some(booking.clone()));
            }
        }
        Ok(None)
    }

    async fn bookings_for_patient(&self, patient_name: &str) -> Result<Vec<Booking>> {
        let needle = patient_name.to_lowercase();
        let bookings = self.bookings.lock().expect("booking store poisoned");
        Ok(bookings
            .iter()
            .filter(|b| b.patient_name.to_lowercase() == needle)
            .cloned()
            .collect())
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let bookings = self.bookings.lock().expect("booking store poisoned");
        Ok(bookings.clone())
    }
}
