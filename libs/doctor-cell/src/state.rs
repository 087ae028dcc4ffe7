use std::sync::Arc;

use shared_config::{AppConfig, StoreBackend};
use shared_utils::clock::Clock;

use crate::services::{AvailabilityService, DoctorService, ScheduleGenerator, SlotLocks};
use crate::store::{AvailabilityStore, DoctorRepository, InMemoryDoctorStore, SupabaseDoctorStore};

/// Shared state behind the doctor routes. The appointment cell reads
/// availability through the same `AvailabilityService`.
#[derive(Clone)]
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<DoctorService>,
    pub availability: Arc<AvailabilityService>,
    pub scheduler: Arc<ScheduleGenerator>,
}

impl DoctorCellState {
    pub fn new(
        config: Arc<AppConfig>,
        doctor_repository: Arc<dyn DoctorRepository>,
        availability_store: Arc<dyn AvailabilityStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(SlotLocks::new());
        let doctors = Arc::new(DoctorService::new(doctor_repository.clone(), locks.clone(), clock.clone()));
        let availability = Arc::new(AvailabilityService::new(
            doctor_repository,
            availability_store.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(ScheduleGenerator::new(
            availability_store,
            config.scheduling.clone(),
            locks,
            clock,
        ));

        Self {
            config,
            doctors,
            availability,
            scheduler,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryDoctorStore::new());
        Self::new(config, store.clone(), store, clock)
    }

    /// Picks the store named by `config.store_backend`.
    pub fn from_config(config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self {
        match config.store_backend {
            StoreBackend::Memory => Self::in_memory(config, clock),
            StoreBackend::Supabase => {
                let store = Arc::new(SupabaseDoctorStore::new(&config));
                Self::new(config, store.clone(), store, clock)
            }
        }
    }
}
