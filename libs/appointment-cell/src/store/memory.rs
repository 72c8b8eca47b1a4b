use std::collections::HashMap;
use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::DatabaseError;

use super::{day_bounds, AppointmentStore};
use crate::models::{Appointment, AppointmentChanges, AppointmentStatus};

/// In-process store with the same uniqueness rule as the database index.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self.rows.lock().await.values().cloned().collect();
        rows.sort_by_key(|a| a.start_at);
        rows
    }

    fn violates_uniqueness(rows: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
        candidate.is_scheduled()
            && rows.values().any(|other| {
                other.id != candidate.id
                    && other.is_scheduled()
                    && other.doctor_id == candidate.doctor_id
                    && other.start_at == candidate.start_at
                    && other.end_at == candidate.end_at
            })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut rows = self.rows.lock().await;

        if rows.contains_key(&appointment.id) {
            return Err(DatabaseError::UniqueViolation(format!("appointment {} already exists", appointment.id)));
        }
        if Self::violates_uniqueness(&rows, appointment) {
            return Err(DatabaseError::UniqueViolation(
                "appointments_doctor_slot_scheduled_key".to_string(),
            ));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut rows = self.rows.lock().await;

        let Some(current) = rows.get(&id).filter(|a| a.is_scheduled()) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        changes.apply_to(&mut updated);

        if Self::violates_uniqueness(&rows, &updated) {
            return Err(DatabaseError::UniqueViolation(
                "appointments_doctor_slot_scheduled_key".to_string(),
            ));
        }

        rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<Appointment> = rows
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.is_scheduled())
            .filter(|a| Some(a.id) != exclude_id)
            .filter(|a| a.start_at < end && a.end_at > start)
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.start_at);
        Ok(matches)
    }

    async fn find_by_window(
        &self,
        status: AppointmentStatus,
        start_range: Range<DateTime<Utc>>,
        reminder_unsent: bool,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<Appointment> = rows
            .values()
            .filter(|a| a.status == status && start_range.contains(&a.start_at))
            .filter(|a| !reminder_unsent || a.reminder_sent_at.is_none())
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.start_at);
        Ok(matches)
    }

    async fn find_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let day = day_bounds(date);
        self.find_overlapping(doctor_id, day.start, day.end, None).await
    }

    async fn count_by_doctor_and_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<u64, DatabaseError> {
        let day = day_bounds(date);
        let rows = self.rows.lock().await;
        let count = rows
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| matches!(a.status, AppointmentStatus::Scheduled | AppointmentStatus::Completed))
            .filter(|a| day.contains(&a.start_at))
            .count();
        Ok(count as u64)
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(appointment) if appointment.is_scheduled() && appointment.reminder_sent_at.is_none() => {
                appointment.reminder_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
