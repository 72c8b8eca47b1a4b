// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, Requester};

pub const MIN_DURATION_MINUTES: i64 = 5;

/// What a requester is trying to do to an existing appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    View,
    Edit,
    Cancel,
    Complete,
    NoShow,
}

/// Guards for the `scheduled -> {completed, cancelled, no_show}` state
/// machine and the role rules around it. Pure; persistence happens elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => &[],
        }
    }

    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::Validation(format!(
                "Appointment is {} and can no longer be modified",
                current
            )));
        }
        Ok(())
    }

    /// Ordering, minimum length and future-ness of a requested interval.
    pub fn validate_interval(
        &self,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if end_at <= start_at {
            return Err(AppointmentError::Validation("End time must be after start time".to_string()));
        }
        if start_at <= now {
            return Err(AppointmentError::Validation("Appointment must start in the future".to_string()));
        }
        if end_at - start_at < Duration::minutes(MIN_DURATION_MINUTES) {
            return Err(AppointmentError::Validation(format!(
                "Appointment must last at least {} minutes",
                MIN_DURATION_MINUTES
            )));
        }
        Ok(())
    }

    pub fn ensure_editable(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        self.validate_transition(appointment.status, AppointmentStatus::Scheduled)
    }

    pub fn ensure_cancellable(
        &self,
        appointment: &Appointment,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.validate_transition(appointment.status, AppointmentStatus::Cancelled)?;

        if appointment.end_at <= now {
            return Err(AppointmentError::Validation(
                "Appointment has already ended and cannot be cancelled".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(AppointmentError::Validation("A cancellation reason is required".to_string()));
        }
        Ok(())
    }

    pub fn ensure_completable(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        self.validate_transition(appointment.status, AppointmentStatus::Completed)
    }

    pub fn ensure_no_show_allowed(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.validate_transition(appointment.status, AppointmentStatus::NoShow)?;

        if appointment.start_at > now {
            return Err(AppointmentError::Validation(
                "Cannot mark a no-show before the appointment starts".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the patient an appointment is booked for and checks the
    /// requester may book it.
    pub fn authorize_create(
        &self,
        requester: &Requester,
        patient_id: Option<Uuid>,
        doctor_id: Uuid,
    ) -> Result<Uuid, AppointmentError> {
        match requester.role {
            Role::Patient => {
                let patient_id = patient_id.unwrap_or(requester.id);
                if patient_id != requester.id {
                    return Err(AppointmentError::Forbidden(
                        "Patients can only book appointments for themselves".to_string(),
                    ));
                }
                Ok(patient_id)
            }
            Role::Doctor => {
                if doctor_id != requester.id {
                    return Err(AppointmentError::Forbidden(
                        "Doctors can only book into their own calendar".to_string(),
                    ));
                }
                patient_id.ok_or_else(|| AppointmentError::Validation("patient_id is required".to_string()))
            }
            Role::Admin => {
                patient_id.ok_or_else(|| AppointmentError::Validation("patient_id is required".to_string()))
            }
        }
    }

    pub fn authorize(
        &self,
        requester: &Requester,
        appointment: &Appointment,
        action: LifecycleAction,
    ) -> Result<(), AppointmentError> {
        let allowed = match requester.role {
            Role::Admin => true,
            Role::Doctor => appointment.doctor_id == requester.id,
            Role::Patient => {
                appointment.patient_id == requester.id
                    && matches!(action, LifecycleAction::View | LifecycleAction::Edit | LifecycleAction::Cancel)
            }
        };

        if !allowed {
            warn!(
                "{} {} denied {:?} on appointment {}",
                requester.role.as_str(),
                requester.id,
                action,
                appointment.id
            );
            return Err(AppointmentError::Forbidden(
                "Not authorized to perform this action on the appointment".to_string(),
            ));
        }
        Ok(())
    }
}
