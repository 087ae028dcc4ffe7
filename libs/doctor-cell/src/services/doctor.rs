use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::auth::{Operation, Ownership, Principal};
use shared_utils::clock::Clock;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorProfile, Specialization, UpdateDoctorRequest,
    DEFAULT_MAX_PATIENTS_PER_DAY, NOT_SPECIFIED,
};
use crate::services::ensure_allowed;
use crate::services::locks::SlotLocks;
use crate::store::DoctorRepository;

pub struct DoctorService {
    doctors: Arc<dyn DoctorRepository>,
    locks: Arc<SlotLocks>,
    clock: Arc<dyn Clock>,
}

impl DoctorService {
    pub fn new(doctors: Arc<dyn DoctorRepository>, locks: Arc<SlotLocks>, clock: Arc<dyn Clock>) -> Self {
        Self { doctors, locks, clock }
    }

    /// Register a doctor profile for the calling account
    pub async fn create_doctor(
        &self,
        principal: &Principal,
        request: CreateDoctorRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        ensure_allowed(principal, Operation::ManageOwnDoctorProfile, &Ownership::none())?;
        debug!("Creating doctor profile for user {}", principal.user_id);

        if self.doctors.find_doctor_by_user(principal.user_id).await?.is_some() {
            return Err(DoctorError::ProfileExists);
        }

        let license_number = request.license_number.trim().to_string();
        if license_number.is_empty() {
            return Err(DoctorError::validation("license_number", "must not be empty"));
        }

        let years_of_experience = request.years_of_experience.unwrap_or(0);
        let consultation_fee_cents = request.consultation_fee_cents.unwrap_or(0);
        let max_patients_per_day = request.max_patients_per_day.unwrap_or(DEFAULT_MAX_PATIENTS_PER_DAY);
        validate_profile_numbers(years_of_experience, consultation_fee_cents, max_patients_per_day)?;

        let specialization = self
            .get_or_create_specialization(&request.specialization, request.specialization_description)
            .await?;

        let now = self.clock.now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: principal.user_id,
            specialization_id: specialization.id,
            degree: non_blank(request.degree),
            license_number: license_number.clone(),
            years_of_experience,
            consultation_fee_cents,
            profile_description: non_blank(request.profile_description),
            max_patients_per_day,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let doctor = match self.doctors.insert_doctor(doctor).await {
            Ok(doctor) => doctor,
            Err(DbError::UniqueViolation(detail)) => {
                warn!("Doctor profile insert hit a unique constraint: {}", detail);
                if self.doctors.find_doctor_by_user(principal.user_id).await?.is_some() {
                    return Err(DoctorError::ProfileExists);
                }
                return Err(DoctorError::LicenseTaken(license_number));
            }
            Err(err) => return Err(err.into()),
        };

        info!("Doctor profile {} created for user {}", doctor.id, doctor.user_id);
        Ok(DoctorProfile { doctor, specialization })
    }

    pub async fn get_own_profile(&self, principal: &Principal) -> Result<DoctorProfile, DoctorError> {
        let doctor = self.own_doctor(principal).await?;
        self.profile(doctor).await
    }

    pub async fn update_own_profile(
        &self,
        principal: &Principal,
        request: UpdateDoctorRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        let owned = self.own_doctor(principal).await?;

        // The daily cap is read by every booking of this doctor.
        let _guard = self.locks.acquire_doctor(owned.id).await;
        let mut doctor = self.load(owned.id).await?;

        if let Some(name) = request.specialization {
            doctor.specialization_id = self.get_or_create_specialization(&name, None).await?.id;
        }
        if let Some(degree) = request.degree {
            doctor.degree = non_blank(Some(degree));
        }
        if let Some(description) = request.profile_description {
            doctor.profile_description = non_blank(Some(description));
        }
        doctor.years_of_experience = request.years_of_experience.unwrap_or(doctor.years_of_experience);
        doctor.consultation_fee_cents = request.consultation_fee_cents.unwrap_or(doctor.consultation_fee_cents);
        doctor.max_patients_per_day = request.max_patients_per_day.unwrap_or(doctor.max_patients_per_day);
        validate_profile_numbers(
            doctor.years_of_experience,
            doctor.consultation_fee_cents,
            doctor.max_patients_per_day,
        )?;

        doctor.updated_at = self.clock.now();
        let doctor = self.doctors.update_doctor(doctor).await?;
        debug!("Doctor profile {} updated", doctor.id);
        self.profile(doctor).await
    }

    /// Stops new bookings for the doctor; history is kept.
    pub async fn deactivate(&self, principal: &Principal, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let doctor = self.load(doctor_id).await?;
        ensure_allowed(principal, Operation::DeactivateDoctor, &Ownership::doctor(doctor.user_id))?;

        // Bookings already past their checks finish first; later ones see the flag.
        let _guard = self.locks.acquire_doctor(doctor_id).await;
        let mut doctor = self.load(doctor_id).await?;
        if !doctor.is_active {
            return Ok(doctor);
        }

        doctor.is_active = false;
        doctor.updated_at = self.clock.now();
        let doctor = self.doctors.update_doctor(doctor).await?;
        info!("Doctor {} deactivated by {}", doctor.id, principal.user_id);
        Ok(doctor)
    }

    /// The caller's own doctor record. Fails for non-doctors and for doctors
    /// without a profile.
    pub async fn own_doctor(&self, principal: &Principal) -> Result<Doctor, DoctorError> {
        ensure_allowed(principal, Operation::ManageOwnDoctorProfile, &Ownership::none())?;
        self.doctors
            .find_doctor_by_user(principal.user_id)
            .await?
            .ok_or(DoctorError::ProfileNotFound)
    }

    pub async fn list_specializations(&self) -> Result<Vec<Specialization>, DoctorError> {
        Ok(self.doctors.list_specializations().await?)
    }

    async fn load(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))
    }

    async fn profile(&self, doctor: Doctor) -> Result<DoctorProfile, DoctorError> {
        let specialization = self
            .doctors
            .get_specialization(doctor.specialization_id)
            .await?
            .ok_or_else(|| {
                DoctorError::Store(DbError::NotFound(format!(
                    "specialization {} of doctor {}",
                    doctor.specialization_id, doctor.id
                )))
            })?;
        Ok(DoctorProfile { doctor, specialization })
    }

    async fn get_or_create_specialization(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Specialization, DoctorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DoctorError::validation("specialization", "must not be empty"));
        }

        if let Some(existing) = self.doctors.find_specialization(name).await? {
            return Ok(existing);
        }

        let created = Specialization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
        };
        match self.doctors.insert_specialization(created).await {
            Ok(specialization) => {
                debug!("Created specialization {}", specialization.name);
                Ok(specialization)
            }
            // Another request created it first.
            Err(err) if err.is_unique_violation() => self
                .doctors
                .find_specialization(name)
                .await?
                .ok_or(DoctorError::Store(err)),
            Err(err) => Err(err.into()),
        }
    }
}

fn non_blank(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn validate_profile_numbers(
    years_of_experience: i32,
    consultation_fee_cents: i64,
    max_patients_per_day: u32,
) -> Result<(), DoctorError> {
    if years_of_experience < 0 {
        return Err(DoctorError::validation("years_of_experience", "must not be negative"));
    }
    if consultation_fee_cents < 0 {
        return Err(DoctorError::validation("consultation_fee_cents", "must not be negative"));
    }
    if max_patients_per_day == 0 {
        return Err(DoctorError::validation("max_patients_per_day", "must be at least 1"));
    }
    Ok(())
}
