use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Application role: `app_metadata.role` wins over the top-level claim,
    /// which identity providers often set to a generic value.
    pub fn application_role(&self) -> Option<String> {
        self.app_metadata
            .as_ref()
            .and_then(|meta| meta.get("role"))
            .and_then(|role| role.as_str())
            .map(str::to_string)
            .or_else(|| self.role.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "admin" => Ok(UserRole::Admin),
            other => Err(AppError::Auth(format!("Unknown role: {}", other))),
        }
    }
}

/// The authenticated caller, passed explicitly into every boundary operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: UserRole,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role, email: None }
    }

    pub fn is(&self, role: UserRole) -> bool {
        self.role == role
    }
}

impl TryFrom<&User> for Principal {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;
        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<UserRole>()?;

        Ok(Self {
            user_id,
            role,
            email: user.email.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateAppointment,
    CompleteAppointment,
    CancelAppointment,
    ViewAppointment,
    ViewDoctorAppointments,
    /// Profile, leave and schedule changes on the caller's own doctor record.
    ManageOwnDoctorProfile,
    DeactivateDoctor,
}

/// Who owns the record an operation targets. `None` means "not applicable".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub doctor_user_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

impl Ownership {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn doctor(doctor_user_id: Uuid) -> Self {
        Self {
            doctor_user_id: Some(doctor_user_id),
            patient_id: None,
        }
    }

    pub fn appointment(doctor_user_id: Uuid, patient_id: Uuid) -> Self {
        Self {
            doctor_user_id: Some(doctor_user_id),
            patient_id: Some(patient_id),
        }
    }

    fn owned_by_doctor(&self, principal: &Principal) -> bool {
        principal.is(UserRole::Doctor) && self.doctor_user_id == Some(principal.user_id)
    }

    fn owned_by_patient(&self, principal: &Principal) -> bool {
        principal.is(UserRole::Patient) && self.patient_id == Some(principal.user_id)
    }
}

/// Decides whether `principal` may perform `operation` on a target with the
/// given ownership. Pure: no lookups happen here.
pub fn authorize(principal: &Principal, operation: Operation, target: &Ownership) -> Result<(), AppError> {
    let is_admin = principal.is(UserRole::Admin);

    let allowed = match operation {
        Operation::CreateAppointment => principal.is(UserRole::Patient),
        Operation::CompleteAppointment => target.owned_by_doctor(principal),
        Operation::CancelAppointment => target.owned_by_doctor(principal) || target.owned_by_patient(principal),
        Operation::ViewAppointment => {
            is_admin || target.owned_by_doctor(principal) || target.owned_by_patient(principal)
        }
        Operation::ViewDoctorAppointments => is_admin || target.owned_by_doctor(principal),
        Operation::ManageOwnDoctorProfile => principal.is(UserRole::Doctor),
        Operation::DeactivateDoctor => is_admin || target.owned_by_doctor(principal),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(denial_message(operation).to_string()))
    }
}

fn denial_message(operation: Operation) -> &'static str {
    match operation {
        Operation::CreateAppointment => "Only patients can book appointments",
        Operation::CompleteAppointment => "Only the appointment's doctor can complete it",
        Operation::CancelAppointment => "Only the appointment's doctor or patient can cancel it",
        Operation::ViewAppointment => "Not authorized to view this appointment",
        Operation::ViewDoctorAppointments => "Not authorized to view this doctor's appointments",
        Operation::ManageOwnDoctorProfile => "You must be a doctor to manage a doctor profile",
        Operation::DeactivateDoctor => "Not authorized to deactivate this doctor profile",
    }
}
