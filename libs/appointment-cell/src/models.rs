use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    /// The uniqueness key: at most one active booking may hold it.
    pub fn slot_key(&self) -> (Uuid, NaiveDate, NaiveTime) {
        (self.doctor_id, self.date, self.start_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Direct booking request on the CRUD surface, bypassing the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub patient_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    /// "HH:MM" or "HH:MM:SS".
    pub time_slot: String,
}

/// Outcome of an insert attempt against the store's unique
/// (doctor, date, start_time) constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Conflict,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Slot is not bookable: {0}")]
    InvalidSlot(String),

    #[error("Slot was already taken")]
    SlotConflict,

    #[error("Storage error: {0}")]
    Storage(String),
}
