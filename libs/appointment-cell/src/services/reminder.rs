// libs/appointment-cell/src/services/reminder.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use doctor_cell::DoctorDirectory;
use notification_queue_cell::{NotificationGateway, APPOINTMENT_REMINDER};
use patient_cell::PatientDirectory;
use shared_config::ReminderConfig;

use crate::clock::Clock;
use crate::models::{Appointment, AppointmentError, AppointmentStatus, AppointmentType, ReminderPayload, SweepSummary};
use crate::store::AppointmentStore;

/// One pass over upcoming appointments, enqueueing a reminder for each that
/// has not had one yet.
///
/// Delivery is at-least-once: `reminder_sent_at` is stamped only after the
/// gateway accepted the job, so a crash in between produces a duplicate on
/// the next pass rather than a lost reminder.
pub struct ReminderService {
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientDirectory>,
    doctors: Arc<dyn DoctorDirectory>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientDirectory>,
        doctors: Arc<dyn DoctorDirectory>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            patients,
            doctors,
            gateway,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    #[instrument(skip(self))]
    pub async fn run_reminder_sweep(&self) -> SweepSummary {
        let now = self.clock.now();
        let window = now + ChronoDuration::minutes(self.config.window_start_minutes)
            ..now + ChronoDuration::minutes(self.config.window_end_minutes);

        debug!("Reminder window {} - {}", window.start, window.end);

        let due = match self
            .store
            .find_by_window(AppointmentStatus::Scheduled, window, true)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!("Reminder sweep could not load appointments: {}", e);
                return SweepSummary {
                    error: Some("appointment store unavailable".to_string()),
                    ..SweepSummary::default()
                };
            }
        };

        let mut summary = SweepSummary {
            matched: due.len(),
            ..SweepSummary::default()
        };

        for appointment in &due {
            match self.remind(appointment).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    warn!("Reminder for appointment {} failed: {}", appointment.id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Reminder sweep finished: matched={}, sent={}, failed={}",
            summary.matched, summary.sent, summary.failed
        );
        summary
    }

    async fn remind(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let contact = self
            .patients
            .find_by_id(appointment.patient_id)
            .await?
            .and_then(|patient| patient.contact())
            .ok_or_else(|| AppointmentError::Validation("Patient has no usable email address".to_string()))?;

        let doctor = self
            .doctors
            .find_by_id(appointment.doctor_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Doctor not found".to_string()))?;

        let payload = build_payload(appointment, contact.name, contact.email, doctor.display_name());
        let body = serde_json::to_value(&payload)
            .map_err(|e| AppointmentError::ExternalService(format!("Could not encode reminder: {}", e)))?;

        let timeout = Duration::from_secs(self.config.enqueue_timeout_seconds);
        let handle = match tokio::time::timeout(timeout, self.gateway.enqueue(APPOINTMENT_REMINDER, body)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(AppointmentError::ExternalService(e.to_string())),
            Err(_) => {
                return Err(AppointmentError::ExternalService(format!(
                    "Notification enqueue timed out after {}s",
                    timeout.as_secs()
                )))
            }
        };

        let stamped = self.store.mark_reminder_sent(appointment.id, self.clock.now()).await?;
        if !stamped {
            debug!("Appointment {} was stamped or changed by another writer", appointment.id);
        }

        debug!("Reminder job {} queued for appointment {}", handle.job_id, appointment.id);
        Ok(())
    }
}

pub fn build_payload(
    appointment: &Appointment,
    recipient_name: String,
    recipient_email: String,
    doctor_name: String,
) -> ReminderPayload {
    ReminderPayload {
        appointment_id: appointment.id,
        recipient_name,
        recipient_email,
        doctor_name,
        date: appointment.start_at.format("%A, %B %-d, %Y").to_string(),
        time: appointment.start_at.format("%H:%M UTC").to_string(),
        appointment_type: appointment.appointment_type,
        meeting_link: match appointment.appointment_type {
            AppointmentType::Virtual => appointment.meeting_link.clone(),
            AppointmentType::InPerson => None,
        },
        reason: appointment.reason.clone(),
    }
}

// ==============================================================================
// PERIODIC SCHEDULER
// ==============================================================================

/// Runs `run_reminder_sweep` on a fixed period until shut down. The first
/// sweep fires immediately; a sweep in progress finishes before the task exits.
pub struct ReminderScheduler {
    service: Arc<ReminderService>,
    period: Duration,
    is_shutdown: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
}

impl ReminderScheduler {
    pub fn new(service: Arc<ReminderService>) -> Self {
        let period = Duration::from_secs(service.config().interval_seconds.max(1));
        Self {
            service,
            period,
            is_shutdown: Arc::new(RwLock::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let is_shutdown = Arc::clone(&self.is_shutdown);
        let wake = Arc::clone(&self.wake);
        let period = self.period;

        info!("Starting reminder scheduler every {}s", period.as_secs());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }

                if *is_shutdown.read().await {
                    break;
                }

                let summary = service.run_reminder_sweep().await;
                if let Some(error) = summary.error {
                    warn!("Reminder sweep aborted: {}", error);
                }
            }

            info!("Reminder scheduler stopped");
        })
    }

    /// Stops the loop without waiting for the next tick.
    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
        // Stores a permit when the task is mid-sweep, so the next select wakes at once.
        self.wake.notify_one();
    }
}
