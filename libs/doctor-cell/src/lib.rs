pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use models::*;
pub use router::doctor_routes;
pub use services::{AvailabilityService, DoctorService, RestDayAction, RestDayPolicy, ScheduleGenerator, SlotLocks};
pub use state::DoctorCellState;
