pub mod booking;
pub mod conflict;
pub mod lifecycle;

use shared_models::auth::{authorize, Operation, Ownership, Principal};
use shared_models::error::AppError;

use crate::models::AppointmentError;

pub use booking::BookingService;
pub use conflict::{ConflictResolver, DaySnapshot, SlotRequest};
pub use lifecycle::AppointmentLifecycleService;

pub(crate) fn ensure_allowed(
    principal: &Principal,
    operation: Operation,
    target: &Ownership,
) -> Result<(), AppointmentError> {
    authorize(principal, operation, target).map_err(|err| match err {
        AppError::Forbidden(message) => AppointmentError::Forbidden(message),
        other => AppointmentError::Forbidden(other.to_string()),
    })
}
