use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{Doctor, LeaveRecord, ScheduleKey, ScheduleUpsert, Specialization, WeeklyScheduleEntry};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryDoctorStore;
pub use supabase::SupabaseDoctorStore;

/// Doctor profiles and specializations.
#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError>;

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>, DbError>;

    /// Fails with `UniqueViolation` when the account or license is already registered.
    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError>;

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError>;

    async fn get_specialization(&self, id: Uuid) -> Result<Option<Specialization>, DbError>;

    /// Case-insensitive lookup by trimmed name.
    async fn find_specialization(&self, name: &str) -> Result<Option<Specialization>, DbError>;

    async fn insert_specialization(&self, specialization: Specialization) -> Result<Specialization, DbError>;

    async fn list_specializations(&self) -> Result<Vec<Specialization>, DbError>;
}

/// Weekly schedule rows and leave records.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn find_schedule_entry(
        &self,
        doctor_id: Uuid,
        key: ScheduleKey,
    ) -> Result<Option<WeeklyScheduleEntry>, DbError>;

    /// Updates the row for `(doctor, key)` if it exists, otherwise inserts it.
    async fn upsert_schedule_entry(&self, upsert: ScheduleUpsert) -> Result<WeeklyScheduleEntry, DbError>;

    /// Date-pinned rows in `[from, to]`, ascending by date.
    async fn list_schedule_entries(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WeeklyScheduleEntry>, DbError>;

    /// Recurring rows, ascending by day of week.
    async fn list_weekly_pattern(&self, doctor_id: Uuid) -> Result<Vec<WeeklyScheduleEntry>, DbError>;

    async fn find_leave(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<LeaveRecord>, DbError>;

    /// Fails with `UniqueViolation` when the doctor already has leave on that date.
    async fn insert_leave(&self, leave: LeaveRecord) -> Result<LeaveRecord, DbError>;

    async fn list_leaves(&self, doctor_id: Uuid) -> Result<Vec<LeaveRecord>, DbError>;
}
