use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::DoctorCellState;

pub fn doctor_routes(state: DoctorCellState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/specializations", get(handlers::list_specializations));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Own profile
        .route("/profile", post(handlers::create_doctor_profile))
        .route("/me", get(handlers::get_own_profile).put(handlers::update_own_profile))
        .route("/{doctor_id}/deactivate", post(handlers::deactivate_doctor))

        // Schedule
        .route("/schedule/generate", post(handlers::generate_weekly_schedule))
        .route("/schedule/pattern", put(handlers::set_weekly_pattern))
        .route("/schedule/{date}", patch(handlers::update_schedule_entry))
        .route("/{doctor_id}/schedule", get(handlers::list_schedule))
        .route("/{doctor_id}/working-window", get(handlers::get_working_window))

        // Leaves
        .route("/leaves", post(handlers::create_leave))
        .route("/{doctor_id}/leaves", get(handlers::list_leaves))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
