// libs/appointment-cell/src/services/conflict.rs
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::Appointment;

/// Half-open interval overlap: touching intervals do not overlap.
pub fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && end1 > start2
}

/// Decides whether a candidate interval collides with a doctor's scheduled
/// appointments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scheduled appointments of `doctor_id` that overlap the candidate.
    /// `exclude_id` drops the appointment being rescheduled.
    pub fn conflicting<'a>(
        &self,
        doctor_id: Uuid,
        candidate_start: DateTime<Utc>,
        candidate_end: DateTime<Utc>,
        existing: &'a [Appointment],
        exclude_id: Option<Uuid>,
    ) -> Vec<&'a Appointment> {
        existing
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.is_scheduled())
            .filter(|a| Some(a.id) != exclude_id)
            .filter(|a| intervals_overlap(candidate_start, candidate_end, a.start_at, a.end_at))
            .collect()
    }

    pub fn has_conflict(
        &self,
        doctor_id: Uuid,
        candidate_start: DateTime<Utc>,
        candidate_end: DateTime<Utc>,
        existing: &[Appointment],
        exclude_id: Option<Uuid>,
    ) -> bool {
        let conflicts = self.conflicting(doctor_id, candidate_start, candidate_end, existing, exclude_id);
        if !conflicts.is_empty() {
            debug!(
                "Candidate {} - {} for doctor {} overlaps {} appointment(s)",
                candidate_start,
                candidate_end,
                doctor_id,
                conflicts.len()
            );
        }
        !conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, AppointmentType};
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap()
    }

    fn appointment(doctor_id: Uuid, start: DateTime<Utc>, minutes: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id,
            start_at: start,
            end_at: start + Duration::minutes(minutes),
            status,
            appointment_type: AppointmentType::InPerson,
            meeting_link: None,
            reason: None,
            notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            completed_at: None,
            reminder_sent_at: None,
            created_by: None,
            updated_by: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        assert!(!intervals_overlap(at(9, 0), at(9, 30), at(9, 30), at(10, 0)));
        assert!(!intervals_overlap(at(9, 30), at(10, 0), at(9, 0), at(9, 30)));
        assert!(intervals_overlap(at(9, 0), at(9, 31), at(9, 30), at(10, 0)));
        assert!(intervals_overlap(at(9, 0), at(11, 0), at(9, 30), at(10, 0)));
    }

    #[test]
    fn only_scheduled_appointments_of_the_doctor_count() {
        let detector = ConflictDetector::new();
        let doctor = Uuid::new_v4();
        let existing = vec![
            appointment(doctor, at(10, 0), 30, AppointmentStatus::Cancelled),
            appointment(Uuid::new_v4(), at(10, 0), 30, AppointmentStatus::Scheduled),
        ];

        assert!(!detector.has_conflict(doctor, at(10, 0), at(10, 30), &existing, None));
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let detector = ConflictDetector::new();
        let doctor = Uuid::new_v4();
        let existing = vec![appointment(doctor, at(10, 0), 30, AppointmentStatus::Scheduled)];

        assert!(detector.has_conflict(doctor, at(10, 15), at(10, 45), &existing, None));
        assert!(!detector.has_conflict(doctor, at(10, 15), at(10, 45), &existing, Some(existing[0].id)));
        assert_eq!(detector.conflicting(doctor, at(9, 0), at(12, 0), &existing, None).len(), 1);
    }
}
