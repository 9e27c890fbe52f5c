use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{Booking, BookingError, CreateBookingRequest};
use crate::BookingCellState;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound => AppError::NotFound(err.to_string()),
            BookingError::DoctorNotFound(_) => AppError::NotFound(err.to_string()),
            BookingError::InvalidSlot(_) => AppError::BadRequest(err.to_string()),
            BookingError::SlotConflict => AppError::Conflict(err.to_string()),
            BookingError::Storage(_) => AppError::Storage(err.to_string()),
        }
    }
}

/// Accepts "09:00" as well as "09:00:00".
pub fn parse_time_slot(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<BookingCellState>>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let doctor = state
        .registry
        .find_by_name(&request.doctor_name)
        .ok_or_else(|| BookingError::DoctorNotFound(request.doctor_name.clone()))?;

    let start_time = parse_time_slot(&request.time_slot)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid time slot: {}", request.time_slot)))?;

    let booking = state
        .committer
        .commit(&request.patient_name, &doctor, request.date, start_time)
        .await?;

    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<Arc<BookingCellState>>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .store
        .all_bookings()
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    Ok(Json(bookings))
}

#[axum::debug_handler]
pub async fn get_patient_bookings(
    State(state): State<Arc<BookingCellState>>,
    Path(patient_name): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .store
        .bookings_for_patient(&patient_name)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    Ok(Json(bookings))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = state.committer.cancel(booking_id).await?;
    Ok(Json(json!({
        "message": "Booking cancelled successfully",
        "booking": booking
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<BookingCellState>>,
    Path((doctor_name, date)): Path<(String, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let doctor = state
        .registry
        .find_by_name(&doctor_name)
        .ok_or_else(|| BookingError::DoctorNotFound(doctor_name.clone()))?;

    let slots = state.committer.availability().compute_slots(&doctor, date).await?;
    let start_times: Vec<String> = slots
        .iter()
        .map(|s| s.start_time.format("%H:%M").to_string())
        .collect();

    Ok(Json(json!({
        "doctor_name": doctor.name,
        "date": date,
        "available_slots": start_times
    })))
}
