use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Principal;
use shared_models::error::AppError;

use crate::models::{BookAppointmentRequest, DoctorDayQuery, UpdateAppointmentStatusRequest};
use crate::state::AppointmentCellState;

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.booking.create_appointment(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Extension(principal): Extension<Principal>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(&principal, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentCellState>,
    Extension(principal): Extension<Principal>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .update_appointment_status(&principal, appointment_id, request.status)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentCellState>,
    Extension(principal): Extension<Principal>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorDayQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .booking
        .list_doctor_appointments(&principal, doctor_id, query.date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<AppointmentCellState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.list_patient_appointments(&principal).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
