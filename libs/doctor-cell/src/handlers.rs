use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Principal;
use shared_models::error::AppError;

use crate::models::{
    CreateDoctorRequest, CreateLeaveRequest, GenerateScheduleRequest, ScheduleRangeQuery, UpdateDoctorRequest,
    UpdateScheduleEntryRequest, WeeklyPatternRequest, WorkingWindowQuery,
};
use crate::state::DoctorCellState;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_specializations(State(state): State<DoctorCellState>) -> Result<Json<Value>, AppError> {
    let specializations = state.doctors.list_specializations().await?;

    Ok(Json(json!({
        "specializations": specializations,
        "total": specializations.len()
    })))
}

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor_profile(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let profile = state.doctors.create_doctor(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(json!(profile))))
}

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, AppError> {
    let profile = state.doctors.get_own_profile(&principal).await?;
    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_own_profile(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = state.doctors.update_own_profile(&principal, request).await?;
    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn deactivate_doctor(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.deactivate(&principal, doctor_id).await?;
    Ok(Json(json!(doctor)))
}

// ==============================================================================
// SCHEDULE
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_weekly_schedule(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<GenerateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.own_doctor(&principal).await?;
    let entries = state.scheduler.generate(&doctor, request).await?;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn set_weekly_pattern(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<WeeklyPatternRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.own_doctor(&principal).await?;
    let entry = state.availability.set_weekly_pattern(&doctor, request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn update_schedule_entry(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Path(date): Path<NaiveDate>,
    Json(request): Json<UpdateScheduleEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.own_doctor(&principal).await?;
    let entry = state.availability.update_schedule_entry(&doctor, date, request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn list_schedule(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ScheduleRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = state.availability.list_schedule(doctor_id, query.from, query.to).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_working_window(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<WorkingWindowQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = state.availability.availability_on(doctor_id, query.date).await?;
    Ok(Json(json!(availability)))
}

// ==============================================================================
// LEAVES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_leave(
    State(state): State<DoctorCellState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = state.doctors.own_doctor(&principal).await?;
    let leave = state.availability.create_leave(&doctor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(leave))))
}

#[axum::debug_handler]
pub async fn list_leaves(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let leaves = state.availability.list_leaves(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "leaves": leaves,
        "total": leaves.len()
    })))
}
