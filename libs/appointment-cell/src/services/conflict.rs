use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{Doctor, WorkingWindow};
use doctor_cell::services::{AvailabilityService, SlotLocks};
use shared_utils::clock::Clock;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::store::BookingLedger;

/// A proposed booking, already attributed to the requesting patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Everything the day checks look at, read while the (doctor, date) lock is held.
#[derive(Debug, Clone)]
pub struct DaySnapshot {
    pub doctor: Doctor,
    pub on_leave: bool,
    pub window: Option<WorkingWindow>,
    /// Confirmed appointments only.
    pub confirmed: Vec<Appointment>,
}

pub type RequestCheck = fn(&SlotRequest, NaiveDate) -> Result<(), AppointmentError>;
pub type DayCheck = fn(&SlotRequest, &DaySnapshot) -> Result<(), AppointmentError>;

/// Checks on the request alone, run before any store access.
pub const REQUEST_CHECKS: [RequestCheck; 2] = [check_not_in_past, check_interval];

/// Checks against the doctor's day, in rejection order.
pub const DAY_CHECKS: [DayCheck; 5] = [
    check_doctor_active,
    check_not_on_leave,
    check_within_working_hours,
    check_slot_free,
    check_daily_cap,
];

pub fn check_not_in_past(request: &SlotRequest, today: NaiveDate) -> Result<(), AppointmentError> {
    if request.date < today {
        return Err(AppointmentError::PastDate(request.date));
    }
    Ok(())
}

pub fn check_interval(request: &SlotRequest, _today: NaiveDate) -> Result<(), AppointmentError> {
    if request.start_time >= request.end_time {
        return Err(AppointmentError::InvalidInterval);
    }
    Ok(())
}

pub fn check_doctor_active(_request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    if !day.doctor.is_active {
        return Err(AppointmentError::DoctorInactive(day.doctor.id));
    }
    Ok(())
}

pub fn check_not_on_leave(request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    if day.on_leave {
        return Err(AppointmentError::DoctorOnLeave(request.date));
    }
    Ok(())
}

pub fn check_within_working_hours(request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    match day.window {
        Some(window) if window.contains(request.start_time, request.end_time) => Ok(()),
        _ => Err(AppointmentError::OutsideWorkingHours),
    }
}

pub fn check_slot_free(request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    if day
        .confirmed
        .iter()
        .any(|existing| existing.overlaps(request.start_time, request.end_time))
    {
        return Err(AppointmentError::SlotTaken);
    }
    Ok(())
}

pub fn check_daily_cap(_request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    let limit = day.doctor.max_patients_per_day;
    if day.confirmed.len() >= limit as usize {
        return Err(AppointmentError::DailyCapExceeded { limit });
    }
    Ok(())
}

/// First failing request check, in order.
pub fn run_request_checks(request: &SlotRequest, today: NaiveDate) -> Result<(), AppointmentError> {
    REQUEST_CHECKS.iter().try_for_each(|check| check(request, today))
}

/// First failing day check, in order.
pub fn run_day_checks(request: &SlotRequest, day: &DaySnapshot) -> Result<(), AppointmentError> {
    DAY_CHECKS.iter().try_for_each(|check| check(request, day))
}

/// Admits or rejects booking requests. Admission for one (doctor, date) is
/// serialized by the `SlotLocks` the doctor cell also takes for leave and
/// schedule edits; the ledger's uniqueness on confirmed start times catches
/// writers outside this process.
pub struct ConflictResolver {
    availability: Arc<AvailabilityService>,
    ledger: Arc<dyn BookingLedger>,
    locks: Arc<SlotLocks>,
    clock: Arc<dyn Clock>,
}

impl ConflictResolver {
    pub fn new(
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        locks: Arc<SlotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            availability,
            ledger,
            locks,
            clock,
        }
    }

    pub async fn request_booking(&self, request: SlotRequest) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking request for doctor {} on {} {}-{}",
            request.doctor_id, request.date, request.start_time, request.end_time
        );

        run_request_checks(&request, self.clock.today()).inspect_err(|err| log_rejection(&request, err))?;

        let _guard = self.locks.acquire(request.doctor_id, request.date).await;

        let day = self.snapshot(&request).await?;
        run_day_checks(&request, &day).inspect_err(|err| log_rejection(&request, err))?;

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        match self.ledger.insert(appointment).await {
            Ok(appointment) => {
                info!(
                    "Appointment {} confirmed for doctor {} on {} at {}",
                    appointment.id, appointment.doctor_id, appointment.date, appointment.start_time
                );
                Ok(appointment)
            }
            Err(err) if err.is_unique_violation() => {
                warn!("Ledger refused a confirmed duplicate start: {}", err);
                Err(AppointmentError::SlotTaken)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn snapshot(&self, request: &SlotRequest) -> Result<DaySnapshot, AppointmentError> {
        let doctor = self.availability.lookup_doctor(request.doctor_id).await?;
        let on_leave = self.availability.is_on_leave(&doctor, request.date).await?;
        let window = self.availability.working_window(&doctor, request.date).await?;
        let confirmed = self
            .ledger
            .list_for_doctor_on(doctor.id, request.date)
            .await?
            .into_iter()
            .filter(Appointment::is_confirmed)
            .collect();

        Ok(DaySnapshot {
            doctor,
            on_leave,
            window,
            confirmed,
        })
    }
}

fn log_rejection(request: &SlotRequest, err: &AppointmentError) {
    warn!(
        "Booking for doctor {} on {} {}-{} rejected: {}",
        request.doctor_id,
        request.date,
        request.start_time,
        request.end_time,
        err.reason_code()
    );
}
