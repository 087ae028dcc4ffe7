use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{Appointment, AppointmentStatus};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryBookingLedger;
pub use supabase::SupabaseBookingLedger;

/// Appointment rows. Among confirmed rows, `(doctor_id, date, start_time)`
/// is unique; a write breaking that fails with `DbError::UniqueViolation`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError>;

    /// Every appointment of the doctor on `date`, ascending by start time.
    async fn list_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DbError>;

    /// Ascending by date, then start time.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DbError>;

    /// Moves a row that is still confirmed to `status`. `None` when no
    /// confirmed row with that id exists.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DbError>;
}
