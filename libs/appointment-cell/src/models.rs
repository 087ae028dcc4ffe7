use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open overlap of `[start_time, end_time)` with `[start, end)`.
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && self.end_time > start
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == AppointmentStatus::Confirmed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorDayQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppointmentError {
    #[error("Appointment date {0} is in the past")]
    PastDate(NaiveDate),

    #[error("Start time must be before end time")]
    InvalidInterval,

    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("Doctor {0} is not accepting appointments")]
    DoctorInactive(Uuid),

    #[error("Doctor is on leave on {0}")]
    DoctorOnLeave(NaiveDate),

    #[error("Requested time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("Requested time overlaps an existing appointment")]
    SlotTaken,

    #[error("Doctor already has {limit} appointments on this date")]
    DailyCapExceeded { limit: u32 },

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Doctor(DoctorError),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl AppointmentError {
    /// Reason code reported to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AppointmentError::PastDate(_) => "PAST_DATE",
            AppointmentError::InvalidInterval => "INVALID_INTERVAL",
            AppointmentError::DoctorNotFound(_) => "DOCTOR_NOT_FOUND",
            AppointmentError::DoctorInactive(_) => "DOCTOR_INACTIVE",
            AppointmentError::DoctorOnLeave(_) => "DOCTOR_ON_LEAVE",
            AppointmentError::OutsideWorkingHours => "OUTSIDE_WORKING_HOURS",
            AppointmentError::SlotTaken => "SLOT_TAKEN",
            AppointmentError::DailyCapExceeded { .. } => "DAILY_CAP_EXCEEDED",
            AppointmentError::NotFound(_) => "NOT_FOUND",
            AppointmentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppointmentError::Forbidden(_) => "FORBIDDEN",
            AppointmentError::Doctor(_) => "DOCTOR_ERROR",
            AppointmentError::Store(_) => "STORAGE_FAULT",
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(id) => AppointmentError::DoctorNotFound(id),
            DoctorError::Inactive(id) => AppointmentError::DoctorInactive(id),
            DoctorError::Forbidden(message) => AppointmentError::Forbidden(message),
            DoctorError::Store(db) => AppointmentError::Store(db),
            other => AppointmentError::Doctor(other),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        let code = err.reason_code();
        match err {
            AppointmentError::PastDate(_) => AppError::validation("date", message),
            AppointmentError::InvalidInterval => AppError::validation("end_time", message),
            AppointmentError::DoctorNotFound(_) | AppointmentError::NotFound(_) => AppError::NotFound(message),
            AppointmentError::Forbidden(message) => AppError::Forbidden(message),
            AppointmentError::Doctor(inner) => inner.into(),
            AppointmentError::Store(db) => db.into(),
            AppointmentError::DoctorInactive(_)
            | AppointmentError::DoctorOnLeave(_)
            | AppointmentError::OutsideWorkingHours
            | AppointmentError::SlotTaken
            | AppointmentError::DailyCapExceeded { .. }
            | AppointmentError::InvalidTransition { .. } => AppError::conflict(code, message),
        }
    }
}
