// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorDirectory, WorkingHoursCalendar};

use crate::clock::Clock;
use crate::models::{Appointment, AppointmentError, AvailabilityResponse, Slot};
use crate::services::conflict::ConflictDetector;
use crate::store::AppointmentStore;

/// Longest slot that can be requested; a slot never spans more than one day.
pub const MAX_SLOT_DURATION_MINUTES: i64 = 24 * 60;

fn validate_duration(duration_minutes: i64) -> Result<(), AppointmentError> {
    if duration_minutes <= 0 {
        return Err(AppointmentError::Validation(
            "Duration must be a positive number of minutes".to_string(),
        ));
    }
    if duration_minutes > MAX_SLOT_DURATION_MINUTES {
        return Err(AppointmentError::Validation(format!(
            "Duration cannot exceed {} minutes",
            MAX_SLOT_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Enumerates bookable slots for one doctor on one day.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvailabilitySlotGenerator {
    calendar: WorkingHoursCalendar,
    detector: ConflictDetector,
}

impl AvailabilitySlotGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks every working-hours range of the day in steps of
    /// `duration + buffer`, keeping slots that start after `now` and do not
    /// overlap a scheduled appointment.
    pub fn generate(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        duration_minutes: i64,
        existing: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, AppointmentError> {
        validate_duration(duration_minutes)?;

        let duration = Duration::minutes(duration_minutes);
        let step = duration + Duration::minutes(i64::from(doctor.buffer_minutes));

        let mut slots = Vec::new();
        for (range_start, range_end) in self.calendar.intervals_on(doctor, date) {
            let mut cursor = range_start;

            while cursor + duration <= range_end {
                let slot_end = cursor + duration;

                if cursor > now && !self.detector.has_conflict(doctor.id, cursor, slot_end, existing, None) {
                    slots.push(Slot { start: cursor, end: slot_end });
                }

                cursor += step;
            }
        }

        Ok(slots)
    }
}

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    calendar: WorkingHoursCalendar,
    generator: AvailabilitySlotGenerator,
}

impl AvailabilityService {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            doctors,
            store,
            clock,
            calendar: WorkingHoursCalendar::new(),
            generator: AvailabilitySlotGenerator::new(),
        }
    }

    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        debug!("Checking availability for doctor {} on {}", doctor_id, date);

        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Doctor not found".to_string()))?;

        let duration_minutes = duration_minutes.unwrap_or(i64::from(doctor.consultation_duration_minutes));
        let unavailable = |reason: &str| AvailabilityResponse {
            doctor_id,
            date,
            duration_minutes,
            available: false,
            slots: Vec::new(),
            reason: Some(reason.to_string()),
        };

        validate_duration(duration_minutes)?;

        if !doctor.is_available {
            return Ok(unavailable("Doctor is not accepting appointments"));
        }

        if self.calendar.ranges_for(&doctor, self.calendar.day_of(date)).is_empty() {
            return Ok(unavailable("Doctor does not work on this day"));
        }

        if let Some(cap) = doctor.max_daily_appointments {
            let booked = self.store.count_by_doctor_and_day(doctor_id, date).await?;
            if booked >= u64::from(cap) {
                return Ok(unavailable("Doctor has reached the daily appointment limit"));
            }
        }

        let existing = self.store.find_for_doctor_on(doctor_id, date).await?;
        let slots = self
            .generator
            .generate(&doctor, date, duration_minutes, &existing, self.clock.now())?;

        info!("Doctor {} has {} open slot(s) on {}", doctor_id, slots.len(), date);

        Ok(AvailabilityResponse {
            doctor_id,
            date,
            duration_minutes,
            available: !slots.is_empty(),
            reason: slots.is_empty().then(|| "No open slots remain on this day".to_string()),
            slots,
        })
    }
}
