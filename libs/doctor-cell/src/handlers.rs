use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::models::Doctor;
use crate::DoctorCellState;

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<DoctorCellState>>,
) -> Result<Json<Vec<Doctor>>, AppError> {
    Ok(Json(state.registry.all()))
}

#[axum::debug_handler]
pub async fn list_departments(
    State(state): State<Arc<DoctorCellState>>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.registry.departments()))
}

#[axum::debug_handler]
pub async fn get_doctors_by_department(
    State(state): State<Arc<DoctorCellState>>,
    Path(department): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.registry.find_by_department(&department);
    if doctors.is_empty() {
        return Err(AppError::NotFound(format!(
            "No doctors found in {} department",
            department
        )));
    }

    Ok(Json(json!({
        "department": department,
        "doctors": doctors,
        "total": doctors.len()
    })))
}
