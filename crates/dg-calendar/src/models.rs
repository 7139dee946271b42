//! Data models for calendar integration

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range starting at `start` lasting `length`
    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> Self {
        Self::new(start, start + length)
    }

    /// Whether the two ranges share any instant
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned identifier
    #[serde(default)]
    pub id: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    /// Create a new calendar event
    pub fn new(summary: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: None,
            summary: summary.into(),
            description: None,
            start,
            end,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Time span occupied by the event
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Parse an IANA zone name such as `Europe/Madrid`
pub fn parse_timezone(value: &str) -> Result<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::Configuration(format!("Invalid time zone: {}", value)))
}

/// Instant of the wall-clock `naive` in `zone`.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times skipped
/// by clocks going forward are read with the offset in force before the jump,
/// which lands them just after it.
pub fn resolve_local(zone: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(a, b) => a.min(b).with_timezone(&Utc),
        LocalResult::None => {
            let before = zone.offset_from_utc_datetime(&(naive - Duration::days(1))).fix();
            (naive - Duration::seconds(i64::from(before.local_minus_utc()))).and_utc()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_overlaps() {
        let a = TimeRange::new(at(9, 0), at(9, 30));
        assert!(a.overlaps(&TimeRange::new(at(9, 15), at(9, 45))));
        assert!(a.overlaps(&TimeRange::new(at(8, 0), at(10, 0))));
        // Touching ranges do not overlap
        assert!(!a.overlaps(&TimeRange::new(at(9, 30), at(10, 0))));
        assert!(!a.overlaps(&TimeRange::new(at(8, 30), at(9, 0))));
    }

    #[test]
    fn test_event_builder() {
        let event = CalendarEvent::new("Cita: Ana", at(10, 0), at(10, 30)).with_description("+34600");
        assert_eq!(event.description.as_deref(), Some("+34600"));
        assert_eq!(event.range().duration(), Duration::minutes(30));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Madrid").unwrap(), Tz::Europe__Madrid);
        assert_eq!(parse_timezone(" UTC ").unwrap(), Tz::UTC);
        assert!(parse_timezone("+01:00").is_err());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_resolve_local_follows_daylight_saving() {
        let madrid = Tz::Europe__Madrid;
        let winter = NaiveDateTime::parse_from_str("2025-03-10 09:00", "%Y-%m-%d %H:%M").unwrap();
        let summer = NaiveDateTime::parse_from_str("2025-07-14 09:00", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(resolve_local(madrid, winter), Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap());
        assert_eq!(resolve_local(madrid, summer), Utc.with_ymd_and_hms(2025, 7, 14, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_local_gap_and_overlap() {
        let madrid = Tz::Europe__Madrid;
        // 2025-03-30 02:30 does not exist in Madrid; it reads as 03:30 CEST
        let gap = NaiveDateTime::parse_from_str("2025-03-30 02:30", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(resolve_local(madrid, gap), Utc.with_ymd_and_hms(2025, 3, 30, 1, 30, 0).unwrap());
        // 2025-10-26 02:30 happens twice; the CEST one comes first
        let overlap = NaiveDateTime::parse_from_str("2025-10-26 02:30", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(resolve_local(madrid, overlap), Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap());
    }
}
