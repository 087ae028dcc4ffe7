use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use shared_utils::clock::Clock;

use crate::models::{
    day_of_week, AvailabilityResponse, CreateLeaveRequest, Doctor, DoctorError, LeaveRecord, ScheduleKey,
    ScheduleUpsert, UpdateScheduleEntryRequest, WeeklyPatternRequest, WeeklyScheduleEntry, WorkingWindow,
};
use crate::services::locks::SlotLocks;
use crate::store::{AvailabilityStore, DoctorRepository};

/// Read side of availability (leave and working windows) plus the doctor
/// initiated edits to leaves and schedule rows. Edits take the same
/// `SlotLocks` guards as bookings.
pub struct AvailabilityService {
    doctors: Arc<dyn DoctorRepository>,
    store: Arc<dyn AvailabilityStore>,
    locks: Arc<SlotLocks>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(
        doctors: Arc<dyn DoctorRepository>,
        store: Arc<dyn AvailabilityStore>,
        locks: Arc<SlotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            doctors,
            store,
            locks,
            clock,
        }
    }

    /// Locks shared with every writer of what a booking reads.
    pub fn locks(&self) -> Arc<SlotLocks> {
        self.locks.clone()
    }

    pub async fn lookup_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))
    }

    pub async fn is_on_leave(&self, doctor: &Doctor, date: NaiveDate) -> Result<bool, DoctorError> {
        Ok(self.store.find_leave(doctor.id, date).await?.is_some())
    }

    /// The date-pinned row wins over the recurring pattern, including when it
    /// is inactive.
    pub async fn working_window(&self, doctor: &Doctor, date: NaiveDate) -> Result<Option<WorkingWindow>, DoctorError> {
        if let Some(pinned) = self.store.find_schedule_entry(doctor.id, ScheduleKey::Date(date)).await? {
            return Ok(pinned.window());
        }

        let pattern = self
            .store
            .find_schedule_entry(doctor.id, ScheduleKey::Weekday(day_of_week(date)))
            .await?;
        Ok(pattern.and_then(|row| row.window()))
    }

    pub async fn availability_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<AvailabilityResponse, DoctorError> {
        let doctor = self.lookup_doctor(doctor_id).await?;
        let on_leave = self.is_on_leave(&doctor, date).await?;
        let working_window = if on_leave {
            None
        } else {
            self.working_window(&doctor, date).await?
        };

        Ok(AvailabilityResponse {
            doctor_id,
            date,
            on_leave,
            working_window,
        })
    }

    pub async fn create_leave(&self, doctor: &Doctor, request: CreateLeaveRequest) -> Result<LeaveRecord, DoctorError> {
        if request.date < self.clock.today() {
            return Err(DoctorError::validation("date", "Leave date cannot be in the past"));
        }

        let _guard = self.locks.acquire(doctor.id, request.date).await;

        if self.store.find_leave(doctor.id, request.date).await?.is_some() {
            return Err(DoctorError::LeaveExists(request.date));
        }

        let leave = LeaveRecord {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            date: request.date,
            reason: request.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            created_at: self.clock.now(),
        };

        match self.store.insert_leave(leave).await {
            Ok(leave) => {
                info!("Leave recorded for doctor {} on {}", leave.doctor_id, leave.date);
                Ok(leave)
            }
            Err(err) if err.is_unique_violation() => Err(DoctorError::LeaveExists(request.date)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_leaves(&self, doctor_id: Uuid) -> Result<Vec<LeaveRecord>, DoctorError> {
        let doctor = self.lookup_doctor(doctor_id).await?;
        Ok(self.store.list_leaves(doctor.id).await?)
    }

    pub async fn set_weekly_pattern(
        &self,
        doctor: &Doctor,
        request: WeeklyPatternRequest,
    ) -> Result<WeeklyScheduleEntry, DoctorError> {
        if request.day_of_week > 6 {
            return Err(DoctorError::validation("day_of_week", "must be between 0 (Monday) and 6 (Sunday)"));
        }
        if request.start_time >= request.end_time {
            return Err(DoctorError::validation("end_time", "End time must be after start time"));
        }

        // A pattern row shapes every unpinned date of that weekday.
        let _guard = self.locks.acquire_doctor(doctor.id).await;

        let entry = self
            .store
            .upsert_schedule_entry(ScheduleUpsert {
                doctor_id: doctor.id,
                key: ScheduleKey::Weekday(request.day_of_week),
                start_time: request.start_time,
                end_time: request.end_time,
                is_active: request.is_active,
                at: self.clock.now(),
            })
            .await?;
        debug!("Weekly pattern for doctor {} day {} set", doctor.id, entry.day_of_week);
        Ok(entry)
    }

    /// Edits the row pinned to `date`. Without one, the recurring pattern for
    /// that weekday is copied onto the date first.
    pub async fn update_schedule_entry(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        request: UpdateScheduleEntryRequest,
    ) -> Result<WeeklyScheduleEntry, DoctorError> {
        let _guard = self.locks.acquire(doctor.id, date).await;

        let base = match self.store.find_schedule_entry(doctor.id, ScheduleKey::Date(date)).await? {
            Some(pinned) => pinned,
            None => self
                .store
                .find_schedule_entry(doctor.id, ScheduleKey::Weekday(day_of_week(date)))
                .await?
                .ok_or(DoctorError::ScheduleEntryNotFound(date))?,
        };

        let start_time = request.start_time.unwrap_or(base.start_time);
        let end_time = request.end_time.unwrap_or(base.end_time);
        if start_time >= end_time {
            return Err(DoctorError::validation("end_time", "End time must be after start time"));
        }

        let entry = self
            .store
            .upsert_schedule_entry(ScheduleUpsert {
                doctor_id: doctor.id,
                key: ScheduleKey::Date(date),
                start_time,
                end_time,
                is_active: request.is_active.unwrap_or(base.is_active),
                at: self.clock.now(),
            })
            .await?;
        debug!("Schedule entry for doctor {} on {} updated", doctor.id, date);
        Ok(entry)
    }

    pub async fn list_schedule(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WeeklyScheduleEntry>, DoctorError> {
        if to < from {
            return Err(DoctorError::validation("to", "must not be before from"));
        }
        let doctor = self.lookup_doctor(doctor_id).await?;
        Ok(self.store.list_schedule_entries(doctor.id, from, to).await?)
    }
}
