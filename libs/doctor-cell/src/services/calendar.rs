// libs/doctor-cell/src/services/calendar.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

use crate::models::{Doctor, TimeRange};

/// Lookups over a doctor's weekly working-hours template.
///
/// All clock times are interpreted against UTC, the single reference clock
/// for scheduling.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkingHoursCalendar;

impl WorkingHoursCalendar {
    pub fn new() -> Self {
        Self
    }

    /// Weekday bucket of a calendar date.
    pub fn day_of(&self, date: NaiveDate) -> Weekday {
        date.weekday()
    }

    /// Open ranges for the weekday, ordered by start and pairwise disjoint.
    /// Overlapping or touching ranges are merged into one block. Empty when
    /// the doctor does not work that day.
    pub fn ranges_for(&self, doctor: &Doctor, weekday: Weekday) -> Vec<TimeRange> {
        let mut ranges = doctor.working_hours.day(weekday).to_vec();
        ranges.sort();

        let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }

    /// Open ranges of `date` as UTC intervals.
    pub fn intervals_on(&self, doctor: &Doctor, date: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.ranges_for(doctor, self.day_of(date))
            .iter()
            .map(|range| range.on(date))
            .collect()
    }

    /// True when `[start, end)` fits entirely inside one open range of the
    /// start's day.
    pub fn contains_interval(&self, doctor: &Doctor, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start >= end {
            return false;
        }

        self.intervals_on(doctor, start.date_naive())
            .into_iter()
            .any(|(range_start, range_end)| start >= range_start && end <= range_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkingHours;
    use chrono::{NaiveTime, TimeZone};
    use uuid::Uuid;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn doctor() -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            working_hours: WorkingHours::default()
                .with(Weekday::Mon, TimeRange::new(hm(14, 0), hm(17, 0)).unwrap())
                .with(Weekday::Mon, TimeRange::new(hm(9, 0), hm(12, 0)).unwrap()),
            buffer_minutes: 0,
            consultation_duration_minutes: 30,
            max_daily_appointments: None,
            is_available: true,
        }
    }

    #[test]
    fn ranges_are_ordered_by_start() {
        let calendar = WorkingHoursCalendar::new();
        let ranges = calendar.ranges_for(&doctor(), Weekday::Mon);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start, hm(9, 0));
        assert_eq!(ranges[1].start, hm(14, 0));
    }

    #[test]
    fn overlapping_and_touching_ranges_are_merged() {
        let calendar = WorkingHoursCalendar::new();
        let mut doctor = doctor();
        doctor.working_hours = WorkingHours::default()
            .with(Weekday::Mon, TimeRange::new(hm(9, 0), hm(12, 0)).unwrap())
            .with(Weekday::Mon, TimeRange::new(hm(11, 0), hm(13, 0)).unwrap())
            .with(Weekday::Mon, TimeRange::new(hm(13, 0), hm(14, 0)).unwrap())
            .with(Weekday::Mon, TimeRange::new(hm(10, 0), hm(10, 30)).unwrap())
            .with(Weekday::Mon, TimeRange::new(hm(16, 0), hm(17, 0)).unwrap());

        let ranges = calendar.ranges_for(&doctor, Weekday::Mon);
        assert_eq!(
            ranges,
            vec![
                TimeRange::new(hm(9, 0), hm(14, 0)).unwrap(),
                TimeRange::new(hm(16, 0), hm(17, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn day_without_hours_is_empty() {
        let calendar = WorkingHoursCalendar::new();
        assert!(calendar.ranges_for(&doctor(), Weekday::Sun).is_empty());
    }

    #[test]
    fn day_of_uses_calendar_weekday() {
        let calendar = WorkingHoursCalendar::new();
        // 2030-01-07 is a Monday.
        assert_eq!(calendar.day_of(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()), Weekday::Mon);
    }

    #[test]
    fn interval_must_fit_inside_a_single_range() {
        let calendar = WorkingHoursCalendar::new();
        let doctor = doctor();

        let at = |h, m| Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap();

        assert!(calendar.contains_interval(&doctor, at(9, 0), at(9, 30)));
        assert!(calendar.contains_interval(&doctor, at(11, 30), at(12, 0)));
        assert!(!calendar.contains_interval(&doctor, at(11, 45), at(12, 15)));
        // Spans the lunch gap between two ranges.
        assert!(!calendar.contains_interval(&doctor, at(11, 0), at(14, 30)));
        assert!(!calendar.contains_interval(&doctor, at(8, 30), at(9, 0)));
    }
}
