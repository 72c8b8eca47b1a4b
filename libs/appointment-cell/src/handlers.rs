// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CancelAppointmentRequest, CompleteAppointmentRequest, CreateAppointmentRequest, Requester,
    UpdateAppointmentRequest,
};
use crate::router::AppointmentState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
}

fn requester(user: &User) -> Result<Requester, AppError> {
    Requester::from_user(user).map_err(AppError::from)
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let requester = requester(&user)?;
    let appointment = state.appointments.create_appointment(request, &requester).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    let view = state.appointments.get_appointment(appointment_id, &requester).await?;

    Ok(Json(json!(view)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    let appointment = state
        .appointments
        .update_appointment(appointment_id, request, &requester)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    let appointment = state
        .appointments
        .cancel_appointment(appointment_id, &request.reason, &requester)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Option<Json<CompleteAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    let notes = body.and_then(|Json(request)| request.notes);
    let appointment = state
        .appointments
        .complete_appointment(appointment_id, notes, &requester)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    let appointment = state.appointments.mark_no_show(appointment_id, &requester).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}

// ==============================================================================
// AVAILABILITY & OPERATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = state
        .availability
        .check_availability(query.doctor_id, query.date, query.duration_minutes)
        .await?;

    Ok(Json(json!(availability)))
}

/// Manual trigger for the reminder sweep. Admin only.
#[axum::debug_handler]
pub async fn run_reminders(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;
    if !requester.is_admin() {
        return Err(AppError::Forbidden("Only administrators can trigger reminders".to_string()));
    }

    info!("Manual reminder sweep requested by {}", requester.id);
    let summary = state.reminders.run_reminder_sweep().await;

    Ok(Json(json!({
        "success": summary.error.is_none(),
        "summary": summary
    })))
}
