use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::services::{AvailabilityService, SlotLocks};
use shared_models::auth::{Operation, Ownership, Principal, UserRole};
use shared_utils::clock::Clock;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest};
use crate::services::conflict::{ConflictResolver, SlotRequest};
use crate::services::ensure_allowed;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::store::BookingLedger;

/// Boundary operations on appointments. Every call carries the caller's
/// `Principal`; authorization happens here before any write.
pub struct BookingService {
    resolver: ConflictResolver,
    availability: Arc<AvailabilityService>,
    ledger: Arc<dyn BookingLedger>,
    locks: Arc<SlotLocks>,
    lifecycle: AppointmentLifecycleService,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = availability.locks();
        let resolver = ConflictResolver::new(availability.clone(), ledger.clone(), locks.clone(), clock.clone());
        Self {
            resolver,
            availability,
            ledger,
            locks,
            lifecycle: AppointmentLifecycleService::new(),
            clock,
        }
    }

    /// Book an appointment for the calling patient
    pub async fn create_appointment(
        &self,
        principal: &Principal,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        ensure_allowed(principal, Operation::CreateAppointment, &Ownership::none())?;

        self.resolver
            .request_booking(SlotRequest {
                doctor_id: request.doctor_id,
                patient_id: principal.user_id,
                date: request.date,
                start_time: request.start_time,
                end_time: request.end_time,
            })
            .await
    }

    /// Complete or cancel an appointment
    pub async fn update_appointment_status(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let doctor = self.availability.lookup_doctor(appointment.doctor_id).await?;
        ensure_allowed(
            principal,
            self.lifecycle.required_operation(new_status),
            &Ownership::appointment(doctor.user_id, appointment.patient_id),
        )?;

        let _guard = self.locks.acquire(appointment.doctor_id, appointment.date).await;

        // Re-read under the lock; a concurrent transition may have won.
        let current = self.load(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let updated = match self
            .ledger
            .update_status(appointment_id, new_status, self.clock.now())
            .await?
        {
            Some(updated) => updated,
            None => {
                // Another writer closed it between the read and the write.
                let latest = self.load(appointment_id).await?;
                return Err(AppointmentError::InvalidTransition {
                    from: latest.status,
                    to: new_status,
                });
            }
        };
        info!(
            "Appointment {} moved from {} to {} by {}",
            updated.id, current.status, updated.status, principal.user_id
        );
        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let doctor = self.availability.lookup_doctor(appointment.doctor_id).await?;
        ensure_allowed(
            principal,
            Operation::ViewAppointment,
            &Ownership::appointment(doctor.user_id, appointment.patient_id),
        )?;
        Ok(appointment)
    }

    /// A doctor's appointments on one date, all statuses, by start time.
    pub async fn list_doctor_appointments(
        &self,
        principal: &Principal,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor = self.availability.lookup_doctor(doctor_id).await?;
        ensure_allowed(principal, Operation::ViewDoctorAppointments, &Ownership::doctor(doctor.user_id))?;

        let appointments = self.ledger.list_for_doctor_on(doctor.id, date).await?;
        debug!("Found {} appointments for doctor {} on {}", appointments.len(), doctor.id, date);
        Ok(appointments)
    }

    pub async fn list_patient_appointments(&self, principal: &Principal) -> Result<Vec<Appointment>, AppointmentError> {
        if !principal.is(UserRole::Patient) {
            return Err(AppointmentError::Forbidden(
                "Only patients have a personal appointment list".to_string(),
            ));
        }
        Ok(self.ledger.list_for_patient(principal.user_id).await?)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{NaiveTime, Utc};

    use doctor_cell::models::{CreateDoctorRequest, GenerateScheduleRequest};
    use doctor_cell::DoctorCellState;
    use shared_database::DbError;
    use shared_utils::clock::FixedClock;
    use shared_utils::test_utils::{TestConfig, TestUser};

    use crate::store::MockBookingLedger;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn doctor_cell_with_schedule(clock: Arc<dyn Clock>) -> (DoctorCellState, Uuid, Principal) {
        let doctors = DoctorCellState::in_memory(TestConfig::default().to_arc(), clock);
        let user = TestUser::doctor("doc@example.com");
        let profile = doctors
            .doctors
            .create_doctor(
                &user.to_principal(),
                CreateDoctorRequest {
                    specialization: "General Practice".to_string(),
                    specialization_description: None,
                    degree: None,
                    license_number: "LIC-RACE".to_string(),
                    years_of_experience: None,
                    consultation_fee_cents: None,
                    profile_description: None,
                    max_patients_per_day: None,
                },
            )
            .await
            .unwrap();
        doctors
            .scheduler
            .generate(
                &profile.doctor,
                GenerateScheduleRequest {
                    start_date: Some(date(2)),
                    end_date: Some(date(8)),
                },
            )
            .await
            .unwrap();
        (doctors, profile.doctor.id, user.to_principal())
    }

    #[tokio::test]
    async fn commit_time_uniqueness_violation_becomes_slot_taken() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(1)));
        let (doctors, doctor_id, _) = doctor_cell_with_schedule(clock.clone()).await;

        // The scan sees a free day, but another writer commits the same start first.
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_list_for_doctor_on()
            .returning(|_, _| Ok(Vec::new()));
        ledger
            .expect_insert()
            .times(1)
            .returning(|_| Err(DbError::UniqueViolation("appointments_confirmed_start_key".to_string())));

        let service = BookingService::new(doctors.availability.clone(), Arc::new(ledger), clock);
        let patient = TestUser::patient("pat@example.com").to_principal();

        let result = service
            .create_appointment(
                &patient,
                BookAppointmentRequest {
                    doctor_id,
                    date: date(2),
                    start_time: time(10, 0),
                    end_time: time(10, 30),
                },
            )
            .await;

        assert_matches!(result, Err(AppointmentError::SlotTaken));
    }

    #[tokio::test]
    async fn store_outage_is_not_a_rejection() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(1)));
        let (doctors, doctor_id, _) = doctor_cell_with_schedule(clock.clone()).await;

        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_list_for_doctor_on()
            .returning(|_, _| Err(DbError::Unavailable("connection refused".to_string())));
        ledger.expect_insert().never();

        let service = BookingService::new(doctors.availability.clone(), Arc::new(ledger), clock);
        let patient = TestUser::patient("pat@example.com").to_principal();

        let result = service
            .create_appointment(
                &patient,
                BookAppointmentRequest {
                    doctor_id,
                    date: date(2),
                    start_time: time(10, 0),
                    end_time: time(10, 30),
                },
            )
            .await;

        assert_matches!(result, Err(AppointmentError::Store(DbError::Unavailable(_))));
    }

    #[tokio::test]
    async fn invalid_interval_never_touches_the_ledger() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(1)));
        let (doctors, doctor_id, _) = doctor_cell_with_schedule(clock.clone()).await;

        let mut ledger = MockBookingLedger::new();
        ledger.expect_list_for_doctor_on().never();
        ledger.expect_insert().never();

        let service = BookingService::new(doctors.availability.clone(), Arc::new(ledger), clock);
        let patient = TestUser::patient("pat@example.com").to_principal();

        let result = service
            .create_appointment(
                &patient,
                BookAppointmentRequest {
                    doctor_id,
                    date: date(2),
                    start_time: time(11, 0),
                    end_time: time(10, 0),
                },
            )
            .await;

        assert_matches!(result, Err(AppointmentError::InvalidInterval));
    }

    #[tokio::test]
    async fn transition_lost_at_the_store_reports_the_winning_status() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(1)));
        let (doctors, doctor_id, doctor) = doctor_cell_with_schedule(clock.clone()).await;

        let now = Utc::now();
        let confirmed = Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: Uuid::new_v4(),
            date: date(2),
            start_time: time(10, 0),
            end_time: time(10, 30),
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        let appointment_id = confirmed.id;

        // Both reads see it confirmed; another instance cancels it before the write.
        let mut reads = 0;
        let mut ledger = MockBookingLedger::new();
        ledger.expect_get().returning(move |_| {
            reads += 1;
            let mut row = confirmed.clone();
            if reads > 2 {
                row.status = AppointmentStatus::Cancelled;
            }
            Ok(Some(row))
        });
        ledger.expect_update_status().times(1).returning(|_, _, _| Ok(None));

        let service = BookingService::new(doctors.availability.clone(), Arc::new(ledger), clock);
        let result = service
            .update_appointment_status(&doctor, appointment_id, AppointmentStatus::Completed)
            .await;

        assert_matches!(
            result,
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::Cancelled,
                to: AppointmentStatus::Completed,
            })
        );
    }
}
