use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentCellState};
use doctor_cell::{doctor_routes, DoctorCellState};

pub fn create_router(doctors: DoctorCellState, appointments: AppointmentCellState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments))
}
