use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{Appointment, AppointmentStatus};
use crate::store::BookingLedger;

type SlotKey = (Uuid, NaiveDate, NaiveTime);

fn slot_key(appointment: &Appointment) -> SlotKey {
    (appointment.doctor_id, appointment.date, appointment.start_time)
}

/// Ledger kept in concurrent maps. `confirmed_starts` plays the part of the
/// partial unique index over confirmed rows.
#[derive(Default)]
pub struct InMemoryBookingLedger {
    appointments: DashMap<Uuid, Appointment>,
    confirmed_starts: DashMap<SlotKey, Uuid>,
}

impl InMemoryBookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_slot(&self, appointment: &Appointment) -> Result<(), DbError> {
        match self.confirmed_starts.entry(slot_key(appointment)) {
            Entry::Occupied(existing) if *existing.get() != appointment.id => Err(DbError::UniqueViolation(format!(
                "appointments ({}, {}, {}) already confirmed",
                appointment.doctor_id, appointment.date, appointment.start_time
            ))),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(appointment.id);
                Ok(())
            }
        }
    }

    fn sorted(mut rows: Vec<Appointment>) -> Vec<Appointment> {
        rows.sort_by_key(|a| (a.date, a.start_time));
        rows
    }
}

#[async_trait]
impl BookingLedger for InMemoryBookingLedger {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        Ok(self.appointments.get(&appointment_id).map(|a| a.value().clone()))
    }

    async fn list_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DbError> {
        let rows = self
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.date == date)
            .map(|a| a.value().clone())
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        let rows = self
            .appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .map(|a| a.value().clone())
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DbError> {
        if appointment.is_confirmed() {
            self.claim_slot(&appointment)?;
        }
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DbError> {
        let Some(mut row) = self.appointments.get_mut(&appointment_id) else {
            return Ok(None);
        };
        if !row.is_confirmed() {
            return Ok(None);
        }

        if status != AppointmentStatus::Confirmed {
            self.confirmed_starts.remove(&slot_key(&row));
        }
        row.status = status;
        row.updated_at = at;
        Ok(Some(row.clone()))
    }
}
