use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{Doctor, LeaveRecord, ScheduleKey, ScheduleUpsert, Specialization, WeeklyScheduleEntry};
use crate::store::{AvailabilityStore, DoctorRepository};

const DOCTORS: &str = "/rest/v1/doctors";
const SPECIALIZATIONS: &str = "/rest/v1/specializations";
const WEEKLY_SCHEDULES: &str = "/rest/v1/weekly_schedules";
const DOCTOR_LEAVES: &str = "/rest/v1/doctor_leaves";

/// PostgREST-backed store. Uniqueness is enforced by the database:
/// `doctors(user_id)`, `doctors(license_number)`, `lower(specializations.name)`,
/// `weekly_schedules(doctor_id, date)`, `weekly_schedules(doctor_id, day_of_week) where date is null`
/// and `doctor_leaves(doctor_id, date)`.
pub struct SupabaseDoctorStore {
    supabase: SupabaseClient,
}

impl SupabaseDoctorStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn first<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>, DbError> {
        let rows: Vec<T> = self.supabase.select(path).await?;
        Ok(rows.into_iter().next())
    }
}

fn schedule_filter(doctor_id: Uuid, key: ScheduleKey) -> String {
    match key {
        ScheduleKey::Date(date) => format!("doctor_id=eq.{}&date=eq.{}", doctor_id, date),
        ScheduleKey::Weekday(day) => format!("doctor_id=eq.{}&date=is.null&day_of_week=eq.{}", doctor_id, day),
    }
}

#[async_trait]
impl DoctorRepository for SupabaseDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
        self.first(&format!("{}?id=eq.{}", DOCTORS, doctor_id)).await
    }

    async fn find_doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>, DbError> {
        self.first(&format!("{}?user_id=eq.{}", DOCTORS, user_id)).await
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError> {
        debug!("Inserting doctor {} for user {}", doctor.id, doctor.user_id);
        self.supabase.write_one(Method::POST, DOCTORS, json!(doctor)).await
    }

    async fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, DbError> {
        let path = format!("{}?id=eq.{}", DOCTORS, doctor.id);
        self.supabase.write_one(Method::PATCH, &path, json!(doctor)).await
    }

    async fn get_specialization(&self, id: Uuid) -> Result<Option<Specialization>, DbError> {
        self.first(&format!("{}?id=eq.{}", SPECIALIZATIONS, id)).await
    }

    async fn find_specialization(&self, name: &str) -> Result<Option<Specialization>, DbError> {
        let path = format!(
            "{}?name=ilike.{}",
            SPECIALIZATIONS,
            urlencoding::encode(name.trim())
        );
        self.first(&path).await
    }

    async fn insert_specialization(&self, specialization: Specialization) -> Result<Specialization, DbError> {
        self.supabase
            .write_one(Method::POST, SPECIALIZATIONS, json!(specialization))
            .await
    }

    async fn list_specializations(&self) -> Result<Vec<Specialization>, DbError> {
        self.supabase
            .select(&format!("{}?order=name.asc", SPECIALIZATIONS))
            .await
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseDoctorStore {
    async fn find_schedule_entry(
        &self,
        doctor_id: Uuid,
        key: ScheduleKey,
    ) -> Result<Option<WeeklyScheduleEntry>, DbError> {
        self.first(&format!("{}?{}", WEEKLY_SCHEDULES, schedule_filter(doctor_id, key)))
            .await
    }

    async fn upsert_schedule_entry(&self, upsert: ScheduleUpsert) -> Result<WeeklyScheduleEntry, DbError> {
        let changes = json!({
            "start_time": upsert.start_time,
            "end_time": upsert.end_time,
            "is_active": upsert.is_active,
            "updated_at": upsert.at,
        });
        let patch_path = format!("{}?{}", WEEKLY_SCHEDULES, schedule_filter(upsert.doctor_id, upsert.key));

        if self.find_schedule_entry(upsert.doctor_id, upsert.key).await?.is_some() {
            return self.supabase.write_one(Method::PATCH, &patch_path, changes).await;
        }

        let at = upsert.at;
        let row = upsert.into_entry(Uuid::new_v4(), at);
        match self.supabase.write_one(Method::POST, WEEKLY_SCHEDULES, json!(row)).await {
            // Lost an insert race for the same key: the row exists now.
            Err(err) if err.is_unique_violation() => {
                debug!("Schedule row for {:?} appeared concurrently, updating", row.key());
                self.supabase.write_one(Method::PATCH, &patch_path, changes).await
            }
            other => other,
        }
    }

    async fn list_schedule_entries(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WeeklyScheduleEntry>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc",
            WEEKLY_SCHEDULES, doctor_id, from, to
        );
        self.supabase.select(&path).await
    }

    async fn list_weekly_pattern(&self, doctor_id: Uuid) -> Result<Vec<WeeklyScheduleEntry>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=is.null&order=day_of_week.asc",
            WEEKLY_SCHEDULES, doctor_id
        );
        self.supabase.select(&path).await
    }

    async fn find_leave(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<LeaveRecord>, DbError> {
        self.first(&format!("{}?doctor_id=eq.{}&date=eq.{}", DOCTOR_LEAVES, doctor_id, date))
            .await
    }

    async fn insert_leave(&self, leave: LeaveRecord) -> Result<LeaveRecord, DbError> {
        self.supabase.write_one(Method::POST, DOCTOR_LEAVES, json!(leave)).await
    }

    async fn list_leaves(&self, doctor_id: Uuid) -> Result<Vec<LeaveRecord>, DbError> {
        self.supabase
            .select(&format!("{}?doctor_id=eq.{}&order=date.asc", DOCTOR_LEAVES, doctor_id))
            .await
    }
}
