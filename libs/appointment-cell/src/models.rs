// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<Uuid>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    #[serde(alias = "in-person", alias = "office")]
    InPerson,

    #[serde(alias = "telehealth", alias = "video")]
    Virtual,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "in_person"),
            AppointmentType::Virtual => write!(f, "virtual"),
        }
    }
}

/// Appointment joined with the display names of its participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Defaults to the requester when a patient books for themselves.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn touches_time(&self) -> bool {
        self.start_at.is_some() || self.end_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub available: bool,
    pub slots: Vec<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ==============================================================================
// STORE CHANGESETS
// ==============================================================================

/// Partial write applied to a scheduled appointment.
///
/// `None` leaves a column untouched. For nullable columns `Some(None)` writes
/// NULL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent_at: Option<Option<DateTime<Utc>>>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentChanges {
    pub fn new(updated_by: Option<Uuid>, updated_at: DateTime<Utc>) -> Self {
        Self {
            start_at: None,
            end_at: None,
            status: None,
            appointment_type: None,
            meeting_link: None,
            reason: None,
            notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            completed_at: None,
            reminder_sent_at: None,
            updated_by,
            updated_at,
        }
    }

    /// Applies the changeset in place, mirroring what the database does.
    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(start_at) = self.start_at {
            appointment.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            appointment.end_at = end_at;
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(appointment_type) = self.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(meeting_link) = &self.meeting_link {
            appointment.meeting_link = meeting_link.clone();
        }
        if let Some(reason) = &self.reason {
            appointment.reason = reason.clone();
        }
        if let Some(notes) = &self.notes {
            appointment.notes = notes.clone();
        }
        if let Some(cancellation_reason) = &self.cancellation_reason {
            appointment.cancellation_reason = cancellation_reason.clone();
        }
        if let Some(cancelled_at) = self.cancelled_at {
            appointment.cancelled_at = cancelled_at;
        }
        if let Some(cancelled_by) = self.cancelled_by {
            appointment.cancelled_by = cancelled_by;
        }
        if let Some(completed_at) = self.completed_at {
            appointment.completed_at = completed_at;
        }
        if let Some(reminder_sent_at) = self.reminder_sent_at {
            appointment.reminder_sent_at = reminder_sent_at;
        }
        appointment.updated_by = self.updated_by;
        appointment.updated_at = self.updated_at;
    }
}

// ==============================================================================
// REQUESTER & REMINDERS
// ==============================================================================

/// Authenticated caller of a scheduling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn from_user(user: &User) -> Result<Self, AppointmentError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppointmentError::Forbidden("User id is not a valid identifier".to_string()))?;
        Ok(Self { id, role: user.app_role() })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Body of an `appointment-reminder` notification job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderPayload {
    pub appointment_id: Uuid,
    pub recipient_name: String,
    pub recipient_email: String,
    pub doctor_name: String,
    pub date: String,
    pub time: String,
    pub appointment_type: AppointmentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(_) => {
                AppointmentError::Conflict("Doctor already has an appointment in this time range".to_string())
            }
            DatabaseError::NotFound(message) => AppointmentError::NotFound(message),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(message) => AppError::ValidationError(message),
            AppointmentError::Conflict(message) => AppError::Conflict(message),
            AppointmentError::NotFound(message) => AppError::NotFound(message),
            AppointmentError::Forbidden(message) => AppError::Forbidden(message),
            AppointmentError::Database(message) => AppError::Database(message),
            AppointmentError::ExternalService(message) => AppError::ExternalService(message),
        }
    }
}
