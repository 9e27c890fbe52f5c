use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::DoctorCellState;

pub fn doctor_routes(state: Arc<DoctorCellState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/departments", get(handlers::list_departments))
        .route("/department/{department}", get(handlers::get_doctors_by_department))
        .with_state(state)
}
