use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};

pub fn create_router(state: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state))
}
