use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{Doctor, LeaveRecord, ScheduleKey, ScheduleUpsert, Specialization, WeeklyScheduleEntry};
use crate::store::{AvailabilityStore, DoctorRepository};

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Process-local store backed by concurrent maps. Unique indexes mirror the
/// constraints of the relational schema.
#[derive(Default)]
pub struct InMemoryDoctorStore {
    doctors: DashMap<Uuid, Doctor>,
    doctors_by_user: DashMap<Uuid, Uuid>,
    licenses: DashMap<String, Uuid>,
    specializations: DashMap<Uuid, Specialization>,
    specialization_names: DashMap<String, Uuid>,
    schedules: DashMap<(Uuid, ScheduleKey), WeeklyScheduleEntry>,
    leaves: DashMap<(Uuid, NaiveDate), LeaveRecord>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DoctorRepository for InMemoryDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
        Ok(self.doctors.get(&doctor_id).map(|d| d.value().clone()))
    }

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>, DbError> {
        let doctor_id = match self.doctors_by_user.get(&user_id) {
            Some(id) => *id.value(),
            None => return Ok(None),
        };
        self.get_doctor(doctor_id).await
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError> {
        match self.doctors_by_user.entry(doctor.user_id) {
            Entry::Occupied(_) => {
                return Err(DbError::UniqueViolation(format!("doctors.user_id {}", doctor.user_id)));
            }
            Entry::Vacant(slot) => {
                slot.insert(doctor.id);
            }
        }

        match self.licenses.entry(doctor.license_number.clone()) {
            Entry::Occupied(_) => {
                self.doctors_by_user.remove(&doctor.user_id);
                return Err(DbError::UniqueViolation(format!(
                    "doctors.license_number {}",
                    doctor.license_number
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(doctor.id);
            }
        }

        self.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError> {
        match self.doctors.get_mut(&doctor.id) {
            Some(mut existing) => {
                *existing = doctor.clone();
                Ok(doctor)
            }
            None => Err(DbError::NotFound(format!("doctors.id {}", doctor.id))),
        }
    }

    async fn get_specialization(&self, id: Uuid) -> Result<Option<Specialization>, DbError> {
        Ok(self.specializations.get(&id).map(|s| s.value().clone()))
    }

    async fn find_specialization(&self, name: &str) -> Result<Option<Specialization>, DbError> {
        let id = match self.specialization_names.get(&normalize_name(name)) {
            Some(id) => *id.value(),
            None => return Ok(None),
        };
        self.get_specialization(id).await
    }

    async fn insert_specialization(&self, specialization: Specialization) -> Result<Specialization, DbError> {
        match self.specialization_names.entry(normalize_name(&specialization.name)) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation(format!(
                "specializations.name {}",
                specialization.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(specialization.id);
                self.specializations.insert(specialization.id, specialization.clone());
                Ok(specialization)
            }
        }
    }

    async fn list_specializations(&self) -> Result<Vec<Specialization>, DbError> {
        let mut all: Vec<Specialization> = self.specializations.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryDoctorStore {
    async fn find_schedule_entry(
        &self,
        doctor_id: Uuid,
        key: ScheduleKey,
    ) -> Result<Option<WeeklyScheduleEntry>, DbError> {
        Ok(self.schedules.get(&(doctor_id, key)).map(|e| e.value().clone()))
    }

    async fn upsert_schedule_entry(&self, upsert: ScheduleUpsert) -> Result<WeeklyScheduleEntry, DbError> {
        let entry = match self.schedules.entry((upsert.doctor_id, upsert.key)) {
            Entry::Occupied(mut existing) => {
                let row = existing.get_mut();
                row.start_time = upsert.start_time;
                row.end_time = upsert.end_time;
                row.is_active = upsert.is_active;
                row.updated_at = upsert.at;
                row.clone()
            }
            Entry::Vacant(slot) => {
                let at = upsert.at;
                slot.insert(upsert.into_entry(Uuid::new_v4(), at)).value().clone()
            }
        };
        Ok(entry)
    }

    async fn list_schedule_entries(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WeeklyScheduleEntry>, DbError> {
        let mut rows: Vec<WeeklyScheduleEntry> = self
            .schedules
            .iter()
            .filter(|e| e.key().0 == doctor_id)
            .filter(|e| matches!(e.value().date, Some(d) if d >= from && d <= to))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.date);
        Ok(rows)
    }

    async fn list_weekly_pattern(&self, doctor_id: Uuid) -> Result<Vec<WeeklyScheduleEntry>, DbError> {
        let mut rows: Vec<WeeklyScheduleEntry> = self
            .schedules
            .iter()
            .filter(|e| e.key().0 == doctor_id && e.value().date.is_none())
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.day_of_week);
        Ok(rows)
    }

    async fn find_leave(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<LeaveRecord>, DbError> {
        Ok(self.leaves.get(&(doctor_id, date)).map(|l| l.value().clone()))
    }

    async fn insert_leave(&self, leave: LeaveRecord) -> Result<LeaveRecord, DbError> {
        match self.leaves.entry((leave.doctor_id, leave.date)) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation(format!(
                "doctor_leaves ({}, {})",
                leave.doctor_id, leave.date
            ))),
            Entry::Vacant(slot) => {
                slot.insert(leave.clone());
                Ok(leave)
            }
        }
    }

    async fn list_leaves(&self, doctor_id: Uuid) -> Result<Vec<LeaveRecord>, DbError> {
        let mut rows: Vec<LeaveRecord> = self
            .leaves
            .iter()
            .filter(|l| l.key().0 == doctor_id)
            .map(|l| l.value().clone())
            .collect();
        rows.sort_by_key(|l| l.date);
        Ok(rows)
    }
}
