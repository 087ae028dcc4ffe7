pub mod availability;
pub mod doctor;
pub mod locks;
pub mod scheduling;

use shared_models::auth::{authorize, Operation, Ownership, Principal};
use shared_models::error::AppError;

use crate::models::DoctorError;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use locks::{DayGuard, SlotLocks};
pub use scheduling::{RestDayAction, RestDayPolicy, ScheduleGenerator};

/// `authorize` for doctor-cell operations.
pub(crate) fn ensure_allowed(
    principal: &Principal,
    operation: Operation,
    target: &Ownership,
) -> Result<(), DoctorError> {
    authorize(principal, operation, target).map_err(|err| match err {
        AppError::Forbidden(message) => DoctorError::Forbidden(message),
        other => DoctorError::Forbidden(other.to_string()),
    })
}
