use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentChanges, AppointmentStatus};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Persistence for appointments.
///
/// Implementations must reject a second `scheduled` row with the same
/// `(doctor_id, start_at, end_at)` by returning `DatabaseError::UniqueViolation`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;

    /// Applies `changes` only while the row is still `scheduled`. Returns
    /// `None` when no scheduled row with that id exists.
    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// Scheduled appointments of the doctor intersecting `[start, end)`.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Appointments with the given status whose start lies in `start_range`,
    /// ordered by start.
    async fn find_by_window(
        &self,
        status: AppointmentStatus,
        start_range: Range<DateTime<Utc>>,
        reminder_unsent: bool,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Scheduled appointments of the doctor intersecting the UTC day.
    async fn find_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError>;

    /// Scheduled and completed appointments starting on the UTC day.
    async fn count_by_doctor_and_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<u64, DatabaseError>;

    /// Stamps `reminder_sent_at` if it is still unset. Returns whether a row
    /// was stamped.
    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError>;
}

/// `[00:00, 24:00)` of `date` in UTC.
pub fn day_bounds(date: NaiveDate) -> Range<DateTime<Utc>> {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    start..start + chrono::Duration::days(1)
}
