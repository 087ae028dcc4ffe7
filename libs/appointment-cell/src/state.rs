use std::sync::Arc;

use doctor_cell::services::AvailabilityService;
use shared_config::{AppConfig, StoreBackend};
use shared_utils::clock::Clock;

use crate::services::BookingService;
use crate::store::{BookingLedger, InMemoryBookingLedger, SupabaseBookingLedger};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<BookingService>,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            booking: Arc::new(BookingService::new(availability, ledger, clock)),
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, availability: Arc<AvailabilityService>, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, availability, Arc::new(InMemoryBookingLedger::new()), clock)
    }

    /// Picks the ledger named by `config.store_backend`.
    pub fn from_config(config: Arc<AppConfig>, availability: Arc<AvailabilityService>, clock: Arc<dyn Clock>) -> Self {
        match config.store_backend {
            StoreBackend::Memory => Self::in_memory(config, availability, clock),
            StoreBackend::Supabase => {
                let ledger = Arc::new(SupabaseBookingLedger::new(&config));
                Self::new(config, availability, ledger, clock)
            }
        }
    }
}
