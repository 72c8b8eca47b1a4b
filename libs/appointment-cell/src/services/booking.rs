// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorDirectory, WorkingHoursCalendar};
use patient_cell::PatientDirectory;

use crate::clock::Clock;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentStatus, AppointmentType, AppointmentView,
    CreateAppointmentRequest, Requester, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetector;
use crate::services::lifecycle::{AppointmentLifecycle, LifecycleAction};
use crate::store::AppointmentStore;

/// Create, edit and transition appointments.
///
/// Every time-affecting write re-checks working hours and conflicts before it
/// reaches the store; the store's uniqueness index catches the races this
/// check-then-write leaves open.
pub struct AppointmentService {
    doctors: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientDirectory>,
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    calendar: WorkingHoursCalendar,
    detector: ConflictDetector,
    lifecycle: AppointmentLifecycle,
    meeting_base_url: String,
}

impl AppointmentService {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        patients: Arc<dyn PatientDirectory>,
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        meeting_base_url: impl Into<String>,
    ) -> Self {
        Self {
            doctors,
            patients,
            store,
            clock,
            calendar: WorkingHoursCalendar::new(),
            detector: ConflictDetector::new(),
            lifecycle: AppointmentLifecycle::new(),
            meeting_base_url: meeting_base_url.into(),
        }
    }

    // ==============================================================================
    // CREATE
    // ==============================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = self
            .lifecycle
            .authorize_create(requester, request.patient_id, request.doctor_id)?;

        info!("Booking appointment for patient {} with doctor {}", patient_id, request.doctor_id);

        let now = self.clock.now();
        self.lifecycle.validate_interval(request.start_at, request.end_at, now)?;

        if self.patients.find_by_id(patient_id).await?.is_none() {
            return Err(AppointmentError::NotFound("Patient not found".to_string()));
        }

        let doctor = self.load_doctor(request.doctor_id).await?;
        if !doctor.is_available {
            return Err(AppointmentError::Validation("Doctor is not accepting appointments".to_string()));
        }

        self.ensure_bookable(&doctor, request.start_at, request.end_at, None).await?;
        self.ensure_daily_capacity(&doctor, request.start_at).await?;

        let id = Uuid::new_v4();
        let meeting_link = self.meeting_link_for(id, request.appointment_type, request.meeting_link);

        let appointment = Appointment {
            id,
            patient_id,
            doctor_id: doctor.id,
            start_at: request.start_at,
            end_at: request.end_at,
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            meeting_link,
            reason: request.reason,
            notes: request.notes,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            completed_at: None,
            reminder_sent_at: None,
            created_by: Some(requester.id),
            updated_by: Some(requester.id),
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert(&appointment).await.map_err(|e| {
            warn!("Insert of appointment {} rejected by store: {}", id, e);
            AppointmentError::from(e)
        })?;

        info!("Appointment {} booked with doctor {} at {}", stored.id, stored.doctor_id, stored.start_at);
        Ok(stored)
    }

    // ==============================================================================
    // UPDATE
    // ==============================================================================

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load_appointment(appointment_id).await?;
        self.lifecycle.authorize(requester, &current, LifecycleAction::Edit)?;
        self.lifecycle.ensure_editable(&current)?;

        let now = self.clock.now();
        let mut changes = AppointmentChanges::new(Some(requester.id), now);

        if request.touches_time() {
            let start_at = request.start_at.unwrap_or(current.start_at);
            // Moving only the start keeps the booked length.
            let end_at = match (request.start_at, request.end_at) {
                (_, Some(end_at)) => end_at,
                (Some(start_at), None) => start_at + current.duration(),
                (None, None) => current.end_at,
            };

            if start_at != current.start_at || end_at != current.end_at {
                self.lifecycle.validate_interval(start_at, end_at, now)?;

                let doctor = self.load_doctor(current.doctor_id).await?;
                self.ensure_bookable(&doctor, start_at, end_at, Some(current.id)).await?;
                if start_at.date_naive() != current.start_at.date_naive() {
                    self.ensure_daily_capacity(&doctor, start_at).await?;
                }

                debug!("Rescheduling appointment {} to {} - {}", current.id, start_at, end_at);
                changes.start_at = Some(start_at);
                changes.end_at = Some(end_at);
                changes.reminder_sent_at = Some(None);
            }
        }

        let appointment_type = request.appointment_type.unwrap_or(current.appointment_type);
        if request.appointment_type.is_some() || request.meeting_link.is_some() {
            let supplied = request.meeting_link.or_else(|| current.meeting_link.clone());
            changes.appointment_type = Some(appointment_type);
            changes.meeting_link = Some(self.meeting_link_for(current.id, appointment_type, supplied));
        }
        if let Some(reason) = request.reason {
            changes.reason = Some(Some(reason));
        }
        if let Some(notes) = request.notes {
            changes.notes = Some(Some(notes));
        }

        let updated = self.apply(current.id, &changes).await?;
        info!("Appointment {} updated", updated.id);
        Ok(updated)
    }

    // ==============================================================================
    // STATUS TRANSITIONS
    // ==============================================================================

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: &str,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load_appointment(appointment_id).await?;
        self.lifecycle.authorize(requester, &current, LifecycleAction::Cancel)?;

        let now = self.clock.now();
        self.lifecycle.ensure_cancellable(&current, reason, now)?;

        let mut changes = AppointmentChanges::new(Some(requester.id), now);
        changes.status = Some(AppointmentStatus::Cancelled);
        changes.cancellation_reason = Some(Some(reason.trim().to_string()));
        changes.cancelled_at = Some(Some(now));
        changes.cancelled_by = Some(Some(requester.id));

        let updated = self.apply(current.id, &changes).await?;
        info!("Appointment {} cancelled by {}", updated.id, requester.id);
        Ok(updated)
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        notes: Option<String>,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load_appointment(appointment_id).await?;
        self.lifecycle.authorize(requester, &current, LifecycleAction::Complete)?;
        self.lifecycle.ensure_completable(&current)?;

        let now = self.clock.now();
        let mut changes = AppointmentChanges::new(Some(requester.id), now);
        changes.status = Some(AppointmentStatus::Completed);
        changes.completed_at = Some(Some(now));

        if let Some(closing) = notes.filter(|n| !n.trim().is_empty()) {
            let merged = match current.notes.as_deref() {
                Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, closing.trim()),
                _ => closing.trim().to_string(),
            };
            changes.notes = Some(Some(merged));
        }

        let updated = self.apply(current.id, &changes).await?;
        info!("Appointment {} completed", updated.id);
        Ok(updated)
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load_appointment(appointment_id).await?;
        self.lifecycle.authorize(requester, &current, LifecycleAction::NoShow)?;

        let now = self.clock.now();
        self.lifecycle.ensure_no_show_allowed(&current, now)?;

        let mut changes = AppointmentChanges::new(Some(requester.id), now);
        changes.status = Some(AppointmentStatus::NoShow);

        let updated = self.apply(current.id, &changes).await?;
        info!("Appointment {} marked as no-show", updated.id);
        Ok(updated)
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        requester: &Requester,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        self.lifecycle.authorize(requester, &appointment, LifecycleAction::View)?;

        let patient_name = self
            .patients
            .find_by_id(appointment.patient_id)
            .await?
            .map(|p| p.full_name());
        let doctor_name = self
            .doctors
            .find_by_id(appointment.doctor_id)
            .await?
            .map(|d| d.display_name());

        Ok(AppointmentView {
            appointment,
            patient_name,
            doctor_name,
        })
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn load_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))
    }

    async fn load_doctor(&self, id: Uuid) -> Result<Doctor, AppointmentError> {
        self.doctors
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Doctor not found".to_string()))
    }

    /// Working hours and conflicts for a candidate interval.
    async fn ensure_bookable(
        &self,
        doctor: &Doctor,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if !self.calendar.contains_interval(doctor, start_at, end_at) {
            return Err(AppointmentError::Validation(
                "Requested time is outside the doctor's working hours".to_string(),
            ));
        }

        let existing = self
            .store
            .find_overlapping(doctor.id, start_at, end_at, exclude_id)
            .await?;

        if self.detector.has_conflict(doctor.id, start_at, end_at, &existing, exclude_id) {
            warn!("Conflict detected for doctor {} at {} - {}", doctor.id, start_at, end_at);
            return Err(AppointmentError::Conflict(
                "Doctor already has an appointment in this time range".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_daily_capacity(&self, doctor: &Doctor, start_at: DateTime<Utc>) -> Result<(), AppointmentError> {
        let Some(cap) = doctor.max_daily_appointments else {
            return Ok(());
        };

        let booked = self
            .store
            .count_by_doctor_and_day(doctor.id, start_at.date_naive())
            .await?;
        if booked >= u64::from(cap) {
            warn!("Doctor {} reached daily cap of {} appointments", doctor.id, cap);
            return Err(AppointmentError::Conflict(
                "Doctor has reached the daily appointment limit".to_string(),
            ));
        }
        Ok(())
    }

    async fn apply(&self, id: Uuid, changes: &AppointmentChanges) -> Result<Appointment, AppointmentError> {
        match self.store.update_by_id(id, changes).await? {
            Some(updated) => Ok(updated),
            None => {
                warn!("Appointment {} left the scheduled state before the write", id);
                Err(AppointmentError::Conflict(
                    "Appointment was modified concurrently and is no longer scheduled".to_string(),
                ))
            }
        }
    }

    fn meeting_link_for(&self, id: Uuid, appointment_type: AppointmentType, supplied: Option<String>) -> Option<String> {
        match appointment_type {
            AppointmentType::InPerson => None,
            AppointmentType::Virtual => supplied
                .filter(|link| !link.trim().is_empty())
                .or_else(|| Some(format!("{}/{}", self.meeting_base_url.trim_end_matches('/'), id))),
        }
    }
}
