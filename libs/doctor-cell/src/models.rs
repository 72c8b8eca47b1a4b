// libs/doctor-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CONSULTATION_MINUTES: u32 = 30;

// ==============================================================================
// DOCTOR PROJECTION
// ==============================================================================

/// Read-only view of a doctor as the scheduling engine needs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub buffer_minutes: u32,
    #[serde(default = "default_consultation_minutes")]
    pub consultation_duration_minutes: u32,
    #[serde(default)]
    pub max_daily_appointments: Option<u32>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_consultation_minutes() -> u32 {
    DEFAULT_CONSULTATION_MINUTES
}

fn default_true() -> bool {
    true
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {}", self.full_name())
    }
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

/// Clock-time range within a day, `start < end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = String;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::new(raw.start, raw.end)
    }
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, String> {
        if start >= end {
            return Err(format!("working-hours range start {} must be before end {}", start, end));
        }
        Ok(Self { start, end })
    }

    /// Materialises the range as a UTC interval on `date`.
    pub fn on(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (date.and_time(self.start).and_utc(), date.and_time(self.end).and_utc())
    }
}

/// Weekly template of open ranges; a missing day means the doctor does not work.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkingHours {
    #[serde(default)]
    pub monday: Vec<TimeRange>,
    #[serde(default)]
    pub tuesday: Vec<TimeRange>,
    #[serde(default)]
    pub wednesday: Vec<TimeRange>,
    #[serde(default)]
    pub thursday: Vec<TimeRange>,
    #[serde(default)]
    pub friday: Vec<TimeRange>,
    #[serde(default)]
    pub saturday: Vec<TimeRange>,
    #[serde(default)]
    pub sunday: Vec<TimeRange>,
}

impl WorkingHours {
    pub fn day(&self, weekday: Weekday) -> &[TimeRange] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn day_mut(&mut self, weekday: Weekday) -> &mut Vec<TimeRange> {
        match weekday {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }

    /// Builder-style helper, mostly for fixtures.
    pub fn with(mut self, weekday: Weekday, range: TimeRange) -> Self {
        let day = self.day_mut(weekday);
        day.push(range);
        day.sort();
        self
    }
}
