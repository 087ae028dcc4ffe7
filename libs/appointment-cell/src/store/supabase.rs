use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::RETURN_REPRESENTATION;
use shared_database::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentStatus};
use crate::store::BookingLedger;

const APPOINTMENTS: &str = "/rest/v1/appointments";

/// PostgREST ledger. Expects the partial index
/// `unique (doctor_id, date, start_time) where status = 'confirmed'`.
pub struct SupabaseBookingLedger {
    supabase: SupabaseClient,
}

impl SupabaseBookingLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl BookingLedger for SupabaseBookingLedger {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        let rows: Vec<Appointment> = self
            .supabase
            .select(&format!("{}?id=eq.{}", APPOINTMENTS, appointment_id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=eq.{}&order=start_time.asc",
            APPOINTMENTS, doctor_id, date
        );
        self.supabase.select(&path).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        let path = format!(
            "{}?patient_id=eq.{}&order=date.asc,start_time.asc",
            APPOINTMENTS, patient_id
        );
        self.supabase.select(&path).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DbError> {
        debug!(
            "Inserting appointment {} for doctor {} on {} at {}",
            appointment.id, appointment.doctor_id, appointment.date, appointment.start_time
        );
        self.supabase
            .write_one(Method::POST, APPOINTMENTS, json!(appointment))
            .await
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DbError> {
        // The status filter makes the transition conditional across instances.
        let path = format!("{}?id=eq.{}&status=eq.confirmed", APPOINTMENTS, appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_prefer(
                Method::PATCH,
                &path,
                Some(json!({ "status": status, "updated_at": at })),
                Some(RETURN_REPRESENTATION),
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
