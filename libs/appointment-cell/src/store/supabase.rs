use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use super::{day_bounds, AppointmentStore};
use crate::models::{Appointment, AppointmentChanges, AppointmentStatus};

const TABLE: &str = "appointments";

/// PostgREST-backed store over the `appointments` table.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

/// RFC 3339 in Zulu form, keeping any fractional seconds so range filters stay exact.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);
        self.supabase.insert(TABLE, serde_json::to_value(appointment)?).await
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        debug!("Updating appointment {}", id);

        let path = format!("/rest/v1/{}?id=eq.{}&status=eq.scheduled", TABLE, id);
        let rows: Vec<Appointment> = self.supabase.update(&path, serde_json::to_value(changes)?).await?;

        Ok(rows.into_iter().next())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/{}?id=eq.{}", TABLE, id);
        let rows: Vec<Appointment> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/{}?doctor_id=eq.{}&status=eq.scheduled&start_at=lt.{}&end_at=gt.{}&order=start_at.asc",
            TABLE,
            doctor_id,
            ts(end),
            ts(start)
        );
        if let Some(exclude_id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        debug!("Looking up overlapping appointments for doctor {}", doctor_id);
        self.supabase.select(&path).await
    }

    async fn find_by_window(
        &self,
        status: AppointmentStatus,
        start_range: Range<DateTime<Utc>>,
        reminder_unsent: bool,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/{}?status=eq.{}&start_at=gte.{}&start_at=lt.{}&order=start_at.asc",
            TABLE,
            status,
            ts(start_range.start),
            ts(start_range.end)
        );
        if reminder_unsent {
            path.push_str("&reminder_sent_at=is.null");
        }

        self.supabase.select(&path).await
    }

    async fn find_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let day = day_bounds(date);
        self.find_overlapping(doctor_id, day.start, day.end, None).await
    }

    async fn count_by_doctor_and_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<u64, DatabaseError> {
        let day = day_bounds(date);
        let path = format!(
            "/rest/v1/{}?doctor_id=eq.{}&status=in.(scheduled,completed)&start_at=gte.{}&start_at=lt.{}",
            TABLE,
            doctor_id,
            ts(day.start),
            ts(day.end)
        );
        self.supabase.count(&path).await
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&status=eq.scheduled&reminder_sent_at=is.null",
            TABLE, id
        );
        let rows: Vec<Appointment> = self
            .supabase
            .update(&path, json!({ "reminder_sent_at": at, "updated_at": at }))
            .await?;

        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_render_in_zulu_without_plus_sign() {
        let at = Utc.with_ymd_and_hms(2030, 1, 7, 9, 30, 0).unwrap();
        assert_eq!(ts(at), "2030-01-07T09:30:00Z");
    }

    #[test]
    fn sub_second_instants_keep_their_fraction() {
        let at = Utc.with_ymd_and_hms(2030, 1, 7, 10, 30, 0).unwrap() + chrono::Duration::milliseconds(500);
        assert_eq!(ts(at), "2030-01-07T10:30:00.500Z");
    }
}
