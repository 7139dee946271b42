//! Opening hours and slot arithmetic
//!
//! All instants are `DateTime<Utc>`; the clinic's time zone is only used to
//! turn local dates and wall-clock times into instants, so opening hours
//! follow daylight saving changes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use dg_calendar::{TimeRange, parse_timezone, resolve_local};
use dg_core::{BookingConfig, OpeningHours};

use crate::error::{BookingError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    day: Weekday,
    open: NaiveTime,
    close: NaiveTime,
}

/// Weekly opening windows of the clinic
#[derive(Debug, Clone)]
pub struct ClinicSchedule {
    windows: Vec<Window>,
    slot: Duration,
    zone: Tz,
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| BookingError::Schedule(format!("invalid time '{}'", value)))
}

impl ClinicSchedule {
    /// Build a schedule from opening hours, slot length and time zone
    pub fn new(hours: &[OpeningHours], slot_minutes: u32, zone: Tz) -> Result<Self> {
        if slot_minutes == 0 {
            return Err(BookingError::Schedule("slot length must be positive".to_string()));
        }

        let mut windows = Vec::new();
        for entry in hours {
            let open = parse_time(&entry.open)?;
            let close = parse_time(&entry.close)?;
            if close <= open {
                return Err(BookingError::Schedule(format!(
                    "{} closes before it opens",
                    entry.open
                )));
            }
            for day in &entry.days {
                let day: Weekday = day
                    .trim()
                    .parse()
                    .map_err(|_| BookingError::Schedule(format!("invalid day '{}'", day)))?;
                windows.push(Window { day, open, close });
            }
        }
        windows.sort_by_key(|w| (w.day.num_days_from_monday(), w.open));

        Ok(Self {
            windows,
            slot: Duration::minutes(i64::from(slot_minutes)),
            zone,
        })
    }

    pub fn from_config(config: &BookingConfig) -> Result<Self> {
        let zone = parse_timezone(&config.timezone).map_err(|e| BookingError::Schedule(e.to_string()))?;
        Self::new(&config.hours, config.slot_minutes, zone)
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn slot_length(&self) -> Duration {
        self.slot
    }

    /// Clinic-local calendar date of `at`
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.zone).date_naive()
    }

    /// Convert `at` to clinic-local time
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.zone)
    }

    /// Instant of the clinic-local wall-clock `time` on `date`
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        resolve_local(self.zone, date.and_time(time))
    }

    /// The whole clinic-local day `date`
    pub fn day_range(&self, date: NaiveDate) -> TimeRange {
        let next = date.succ_opt().unwrap_or(date);
        TimeRange::new(self.to_utc(date, NaiveTime::MIN), self.to_utc(next, NaiveTime::MIN))
    }

    /// Opening windows on `date`, in order
    pub fn windows(&self, date: NaiveDate) -> Vec<TimeRange> {
        self.windows
            .iter()
            .filter(|w| w.day == date.weekday())
            .map(|w| TimeRange::new(self.to_utc(date, w.open), self.to_utc(date, w.close)))
            .collect()
    }

    /// Whether `[start, start + length)` fits inside one opening window
    pub fn is_within_hours(&self, start: DateTime<Utc>, length: Duration) -> bool {
        let end = start + length;
        self.windows(self.local_date(start))
            .iter()
            .any(|w| w.start <= start && end <= w.end)
    }

    /// Free slot starts on `date`. Slots are aligned to each window's opening
    /// time and must not overlap anything in `busy`.
    pub fn free_slots(&self, date: NaiveDate, busy: &[TimeRange]) -> Vec<DateTime<Utc>> {
        let mut slots = Vec::new();
        for window in self.windows(date) {
            let mut start = window.start;
            while start + self.slot <= window.end {
                let candidate = TimeRange::starting_at(start, self.slot);
                if !busy.iter().any(|b| b.overlaps(&candidate)) {
                    slots.push(start);
                }
                start += self.slot;
            }
        }
        slots
    }

    /// Up to `limit` free slots starting at or after `after`, searching
    /// `horizon_days` days from the local date of `after`
    pub fn suggest(
        &self,
        after: DateTime<Utc>,
        busy: &[TimeRange],
        limit: usize,
        horizon_days: u32,
    ) -> Vec<DateTime<Utc>> {
        let first = self.local_date(after);
        let mut found = Vec::new();

        for date in first.iter_days().take(horizon_days as usize + 1) {
            for slot in self.free_slots(date, busy) {
                if slot < after {
                    continue;
                }
                found.push(slot);
                if found.len() >= limit {
                    return found;
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> ClinicSchedule {
        ClinicSchedule::from_config(&BookingConfig::default()).unwrap()
    }

    /// 2025-03-10 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn local(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        schedule().to_utc(date, NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn test_to_utc_applies_offset() {
        let at = local(monday(), 10, 0);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
        assert_eq!(schedule().local_date(at), monday());
    }

    #[test]
    fn test_summer_hours_follow_daylight_saving() {
        let schedule = schedule();
        // Monday 2025-07-14, Madrid is on CEST (+02:00)
        let july = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        let open = Utc.with_ymd_and_hms(2025, 7, 14, 7, 0, 0).unwrap();
        assert_eq!(schedule.free_slots(july, &[])[0], open);
        assert!(schedule.is_within_hours(open, schedule.slot_length()));
        assert!(!schedule.is_within_hours(open - Duration::minutes(30), schedule.slot_length()));
        assert_eq!(schedule.local(open).format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn test_day_range_on_clock_change() {
        // Clocks go forward on 2025-03-30, so that day lasts 23 hours
        let day = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        assert_eq!(schedule().day_range(day).duration(), Duration::hours(23));
    }

    #[test]
    fn test_windows_per_weekday() {
        let schedule = schedule();
        assert_eq!(schedule.windows(monday()).len(), 2);
        let saturday = monday() + Duration::days(5);
        assert_eq!(
            schedule.windows(saturday),
            vec![TimeRange::new(local(saturday, 10, 0), local(saturday, 14, 0))]
        );
        assert!(schedule.windows(monday() + Duration::days(6)).is_empty());
    }

    #[test]
    fn test_is_within_hours() {
        let schedule = schedule();
        let slot = schedule.slot_length();
        assert!(schedule.is_within_hours(local(monday(), 9, 0), slot));
        assert!(schedule.is_within_hours(local(monday(), 13, 30), slot));
        assert!(!schedule.is_within_hours(local(monday(), 13, 45), slot));
        assert!(!schedule.is_within_hours(local(monday(), 14, 30), slot));
        assert!(!schedule.is_within_hours(local(monday(), 8, 30), slot));
    }

    #[test]
    fn test_free_slots_skip_busy() {
        let schedule = schedule();
        let all = schedule.free_slots(monday(), &[]);
        // 09-14 and 16-20 in 30 minute slots
        assert_eq!(all.len(), 10 + 8);
        assert_eq!(all[0], local(monday(), 9, 0));

        let busy = [TimeRange::new(local(monday(), 9, 15), local(monday(), 10, 0))];
        let free = schedule.free_slots(monday(), &busy);
        assert_eq!(free.len(), all.len() - 2);
        assert_eq!(free[0], local(monday(), 10, 0));
    }

    #[test]
    fn test_suggest_rolls_to_next_day() {
        let schedule = schedule();
        let found = schedule.suggest(local(monday(), 19, 15), &[], 3, 14);
        assert_eq!(
            found,
            vec![
                local(monday(), 19, 30),
                local(monday() + Duration::days(1), 9, 0),
                local(monday() + Duration::days(1), 9, 30),
            ]
        );
    }

    #[test]
    fn test_suggest_respects_horizon() {
        let schedule = schedule();
        let sunday = monday() + Duration::days(6);
        assert!(schedule.suggest(local(sunday, 10, 0), &[], 3, 0).is_empty());
        assert_eq!(schedule.suggest(local(sunday, 10, 0), &[], 1, 1).len(), 1);
    }

    #[test]
    fn test_invalid_hours() {
        let bad_day = [OpeningHours::new(&["someday"], "09:00", "10:00")];
        assert!(ClinicSchedule::new(&bad_day, 30, Tz::UTC).is_err());
        let reversed = [OpeningHours::new(&["mon"], "10:00", "09:00")];
        assert!(ClinicSchedule::new(&reversed, 30, Tz::UTC).is_err());
        assert!(ClinicSchedule::new(&[], 0, Tz::UTC).is_err());

        let config = BookingConfig {
            timezone: "+01:00".to_string(),
            ..Default::default()
        };
        assert!(ClinicSchedule::from_config(&config).is_err());
    }
}
