// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers;
use crate::services::{AppointmentService, AvailabilityService, ReminderService};

/// Services shared by the appointment handlers.
pub struct AppointmentState {
    pub appointments: Arc<AppointmentService>,
    pub availability: Arc<AvailabilityService>,
    pub reminders: Arc<ReminderService>,
    pub auth: Arc<AuthState>,
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/availability", get(handlers::check_availability))
        .route("/reminders/run", post(handlers::run_reminders))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).patch(handlers::update_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .layer(middleware::from_fn_with_state(state.auth.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
