#![allow(dead_code)]

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::*;
use doctor_cell::{Doctor, InMemoryDoctorDirectory, TimeRange, WorkingHours};
use notification_queue_cell::{InMemoryNotificationQueue, NotificationGateway};
use patient_cell::{InMemoryPatientDirectory, Patient};
use shared_config::ReminderConfig;
use shared_database::DatabaseError;
use shared_models::auth::Role;

/// Monday 2030-01-07.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

/// Noon on the Sunday before `monday()`.
pub fn sunday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 6, 12, 0, 0).unwrap()
}

pub fn on_monday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Works Monday 09:00-12:00, 30 minute consultations, no buffer.
pub fn monday_doctor() -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        first_name: "Ana".to_string(),
        last_name: "Silva".to_string(),
        working_hours: WorkingHours::default().with(Weekday::Mon, TimeRange::new(hm(9, 0), hm(12, 0)).unwrap()),
        buffer_minutes: 0,
        consultation_duration_minutes: 30,
        max_daily_appointments: None,
        is_available: true,
    }
}

pub fn patient(email: Option<&str>) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        email: email.map(str::to_string),
        phone: None,
    }
}

pub fn booking(doctor: &Doctor, start: DateTime<Utc>, minutes: i64) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: None,
        doctor_id: doctor.id,
        start_at: start,
        end_at: start + Duration::minutes(minutes),
        appointment_type: AppointmentType::InPerson,
        meeting_link: None,
        reason: Some("Check-up".to_string()),
        notes: None,
    }
}

/// Fully in-memory wiring of the scheduling services.
pub struct Harness {
    pub doctor: Doctor,
    pub patient: Patient,
    pub doctors: Arc<InMemoryDoctorDirectory>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub clock: Arc<FixedClock>,
    pub queue: Arc<InMemoryNotificationQueue>,
    pub appointments: Arc<AppointmentService>,
    pub availability: Arc<AvailabilityService>,
    pub reminders: Arc<ReminderService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_doctor(monday_doctor())
    }

    pub fn with_doctor(doctor: Doctor) -> Self {
        let queue = Arc::new(InMemoryNotificationQueue::new());
        Self::build(doctor, queue.clone(), queue, ReminderConfig::default())
    }

    pub fn with_gateway(gateway: Arc<dyn NotificationGateway>, config: ReminderConfig) -> Self {
        Self::build(monday_doctor(), Arc::new(InMemoryNotificationQueue::new()), gateway, config)
    }

    fn build(
        doctor: Doctor,
        queue: Arc<InMemoryNotificationQueue>,
        gateway: Arc<dyn NotificationGateway>,
        config: ReminderConfig,
    ) -> Self {
        let patient = patient(Some("john@example.com"));
        let doctors = Arc::new(InMemoryDoctorDirectory::with_doctors([doctor.clone()]));
        let patients = Arc::new(InMemoryPatientDirectory::with_patients([patient.clone()]));
        let store = Arc::new(InMemoryAppointmentStore::new());
        let clock = Arc::new(FixedClock::new(sunday_noon()));

        let appointments = Arc::new(AppointmentService::new(
            doctors.clone(),
            patients.clone(),
            store.clone(),
            clock.clone(),
            "https://meet.test",
        ));
        let availability = Arc::new(AvailabilityService::new(doctors.clone(), store.clone(), clock.clone()));
        let reminders = Arc::new(ReminderService::new(
            store.clone(),
            patients.clone(),
            doctors.clone(),
            gateway,
            clock.clone(),
            config,
        ));

        Self {
            doctor,
            patient,
            doctors,
            patients,
            store,
            clock,
            queue,
            appointments,
            availability,
            reminders,
        }
    }

    pub fn as_patient(&self) -> Requester {
        Requester::new(self.patient.id, Role::Patient)
    }

    pub fn as_doctor(&self) -> Requester {
        Requester::new(self.doctor.id, Role::Doctor)
    }

    pub fn as_admin(&self) -> Requester {
        Requester::new(Uuid::new_v4(), Role::Admin)
    }

    /// Booking service over `store`, sharing this harness's directories and clock.
    pub fn service_with_store(&self, store: Arc<dyn AppointmentStore>) -> AppointmentService {
        AppointmentService::new(
            self.doctors.clone(),
            self.patients.clone(),
            store,
            self.clock.clone(),
            "https://meet.test",
        )
    }

    /// Reminder service over `store`, delivering into this harness's queue.
    pub fn reminders_with_store(&self, store: Arc<dyn AppointmentStore>) -> Arc<ReminderService> {
        Arc::new(ReminderService::new(
            store,
            self.patients.clone(),
            self.doctors.clone(),
            self.queue.clone(),
            self.clock.clone(),
            ReminderConfig::default(),
        ))
    }

    pub async fn book(&self, start: DateTime<Utc>, minutes: i64) -> Appointment {
        self.appointments
            .create_appointment(booking(&self.doctor, start, minutes), &self.as_patient())
            .await
            .expect("booking should succeed")
    }
}

/// Store whose overlap lookups see nothing, as when a competing write lands
/// between the conflict check and the insert. Writes still go through the
/// wrapped store and its uniqueness rule.
pub struct StaleReadStore {
    pub inner: Arc<InMemoryAppointmentStore>,
}

#[async_trait]
impl AppointmentStore for StaleReadStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        self.inner.insert(appointment).await
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.update_by_id(id, changes).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.find_by_id(id).await
    }

    async fn find_overlapping(
        &self,
        _doctor_id: Uuid,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn find_by_window(
        &self,
        status: AppointmentStatus,
        start_range: Range<DateTime<Utc>>,
        reminder_unsent: bool,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.find_by_window(status, start_range, reminder_unsent).await
    }

    async fn find_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.find_for_doctor_on(doctor_id, date).await
    }

    async fn count_by_doctor_and_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<u64, DatabaseError> {
        self.inner.count_by_doctor_and_day(doctor_id, date).await
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        self.inner.mark_reminder_sent(id, at).await
    }
}

/// Store whose reminder-window query fails a set number of times before
/// delegating, as when the database drops out for a while.
pub struct FlakyWindowStore {
    pub inner: Arc<InMemoryAppointmentStore>,
    pub window_failures: AtomicUsize,
}

impl FlakyWindowStore {
    pub fn new(inner: Arc<InMemoryAppointmentStore>, window_failures: usize) -> Self {
        Self {
            inner,
            window_failures: AtomicUsize::new(window_failures),
        }
    }
}

#[async_trait]
impl AppointmentStore for FlakyWindowStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        self.inner.insert(appointment).await
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.update_by_id(id, changes).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.find_by_id(id).await
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.find_overlapping(doctor_id, start, end, exclude_id).await
    }

    async fn find_by_window(
        &self,
        status: AppointmentStatus,
        start_range: Range<DateTime<Utc>>,
        reminder_unsent: bool,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let failing = self
            .window_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DatabaseError::Transport("connection refused".to_string()));
        }
        self.inner.find_by_window(status, start_range, reminder_unsent).await
    }

    async fn find_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.find_for_doctor_on(doctor_id, date).await
    }

    async fn count_by_doctor_and_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<u64, DatabaseError> {
        self.inner.count_by_doctor_and_day(doctor_id, date).await
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        self.inner.mark_reminder_sent(id, at).await
    }
}
