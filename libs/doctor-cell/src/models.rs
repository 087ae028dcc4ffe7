use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

pub const NOT_SPECIFIED: &str = "Not Specified";
pub const DEFAULT_MAX_PATIENTS_PER_DAY: u32 = 10;
pub const REST_DAY_LEAVE_REASON: &str = "Weekly rest day";

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization_id: Uuid,
    pub degree: String,
    pub license_number: String,
    pub years_of_experience: i32,
    pub consultation_fee_cents: i64,
    pub profile_description: String,
    pub max_patients_per_day: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A doctor together with its specialization, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub specialization: Specialization,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Day of week with Monday as 0.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Identifies a schedule row for one doctor: either pinned to a calendar date
/// or the recurring pattern for a weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKey {
    Date(NaiveDate),
    Weekday(u8),
}

impl ScheduleKey {
    pub fn day_of_week(&self) -> u8 {
        match self {
            ScheduleKey::Date(date) => day_of_week(*date),
            ScheduleKey::Weekday(day) => *day,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ScheduleKey::Date(date) => Some(*date),
            ScheduleKey::Weekday(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// `None` for the recurring row of `day_of_week`.
    pub date: Option<NaiveDate>,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyScheduleEntry {
    pub fn key(&self) -> ScheduleKey {
        match self.date {
            Some(date) => ScheduleKey::Date(date),
            None => ScheduleKey::Weekday(self.day_of_week),
        }
    }

    /// The working window this row grants, or `None` when it is switched off.
    pub fn window(&self) -> Option<WorkingWindow> {
        self.is_active.then_some(WorkingWindow {
            start: self.start_time,
            end: self.end_time,
        })
    }
}

/// Write model for the update-if-exists-else-create path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleUpsert {
    pub doctor_id: Uuid,
    pub key: ScheduleKey,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub at: DateTime<Utc>,
}

impl ScheduleUpsert {
    pub fn into_entry(self, id: Uuid, created_at: DateTime<Utc>) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry {
            id,
            doctor_id: self.doctor_id,
            date: self.key.date(),
            day_of_week: self.key.day_of_week(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: self.is_active,
            created_at,
            updated_at: self.at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingWindow {
    /// True when `[start, end)` lies entirely inside the window.
    pub fn contains(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start <= start && end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRecord {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUESTS AND RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub specialization: String,
    pub specialization_description: Option<String>,
    pub degree: Option<String>,
    pub license_number: String,
    pub years_of_experience: Option<i32>,
    pub consultation_fee_cents: Option<i64>,
    pub profile_description: Option<String>,
    pub max_patients_per_day: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialization: Option<String>,
    pub degree: Option<String>,
    pub years_of_experience: Option<i32>,
    pub consultation_fee_cents: Option<i64>,
    pub profile_description: Option<String>,
    pub max_patients_per_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaveRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateScheduleRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPatternRequest {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleEntryRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkingWindowQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub on_leave: bool,
    pub working_window: Option<WorkingWindow>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DoctorError {
    #[error("Doctor {0} not found")]
    NotFound(Uuid),

    #[error("No doctor profile exists for this account")]
    ProfileNotFound,

    #[error("A doctor profile already exists for this account")]
    ProfileExists,

    #[error("License number {0} is already registered")]
    LicenseTaken(String),

    #[error("Doctor {0} is inactive")]
    Inactive(Uuid),

    #[error("Leave already recorded for {0}")]
    LeaveExists(NaiveDate),

    #[error("No schedule entry for {0}")]
    ScheduleEntryNotFound(NaiveDate),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl DoctorError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DoctorError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        let message = err.to_string();
        match err {
            DoctorError::NotFound(_) | DoctorError::ProfileNotFound | DoctorError::ScheduleEntryNotFound(_) => {
                AppError::NotFound(message)
            }
            DoctorError::ProfileExists => AppError::conflict("PROFILE_EXISTS", message),
            DoctorError::LicenseTaken(_) => AppError::conflict("LICENSE_EXISTS", message),
            DoctorError::Inactive(_) => AppError::conflict("DOCTOR_INACTIVE", message),
            DoctorError::LeaveExists(_) => AppError::conflict("LEAVE_EXISTS", message),
            DoctorError::Validation { field, message } => AppError::validation(field, message),
            DoctorError::Forbidden(message) => AppError::Forbidden(message),
            DoctorError::Store(db) => db.into(),
        }
    }
}
