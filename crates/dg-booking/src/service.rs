//! Booking against the clinic calendar

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dg_calendar::{CalendarEvent, CalendarProvider, TimeRange};
use dg_core::BookingConfig;
use tracing::{debug, info};

use crate::error::Result;
use crate::extract::{BookingRequest, Detail};
use crate::schedule::ClinicSchedule;

/// Days listed when availability is asked without a date
const AVAILABILITY_DAYS: usize = 3;

/// Tunables of the booking flow
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub max_suggestions: usize,
    pub horizon_days: u32,
    pub event_title: String,
}

impl From<&BookingConfig> for BookingSettings {
    fn from(config: &BookingConfig) -> Self {
        Self {
            max_suggestions: config.max_suggestions,
            horizon_days: config.horizon_days,
            event_title: config.event_title.clone(),
        }
    }
}

/// Who is asking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// WhatsApp number of the sender
    pub phone: String,
    /// WhatsApp profile name, if any
    pub name: Option<String>,
}

impl Contact {
    pub fn new(phone: impl Into<String>, name: Option<String>) -> Self {
        Self {
            phone: phone.into(),
            name,
        }
    }
}

/// Result of a booking attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    MissingDetails {
        request: BookingRequest,
        missing: Vec<Detail>,
    },
    InPast {
        requested: DateTime<Utc>,
    },
    OutsideHours {
        requested: DateTime<Utc>,
        alternatives: Vec<DateTime<Utc>>,
    },
    SlotTaken {
        requested: DateTime<Utc>,
        alternatives: Vec<DateTime<Utc>>,
    },
    Booked {
        name: String,
        event: CalendarEvent,
    },
}

/// Free slots of one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub date: NaiveDate,
    pub slots: Vec<DateTime<Utc>>,
}

/// Checks requests against opening hours and the calendar, and books them
pub struct BookingService {
    calendar: Arc<dyn CalendarProvider>,
    schedule: ClinicSchedule,
    settings: BookingSettings,
}

impl BookingService {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        schedule: ClinicSchedule,
        settings: BookingSettings,
    ) -> Self {
        Self {
            calendar,
            schedule,
            settings,
        }
    }

    pub fn from_config(calendar: Arc<dyn CalendarProvider>, config: &BookingConfig) -> Result<Self> {
        Ok(Self::new(
            calendar,
            ClinicSchedule::from_config(config)?,
            BookingSettings::from(config),
        ))
    }

    pub fn schedule(&self) -> &ClinicSchedule {
        &self.schedule
    }

    /// Busy ranges from the start of `first` through the search horizon
    async fn busy_from(&self, first: NaiveDate) -> Result<Vec<TimeRange>> {
        let start = self.schedule.day_range(first).start;
        let range = TimeRange::starting_at(start, Duration::days(i64::from(self.settings.horizon_days) + 1));
        let events = self.calendar.list_events(range).await?;
        debug!("{} busy events from {}", events.len(), first);
        Ok(events.iter().map(CalendarEvent::range).collect())
    }

    fn suggest(&self, after: DateTime<Utc>, busy: &[TimeRange]) -> Vec<DateTime<Utc>> {
        self.schedule.suggest(
            after,
            busy,
            self.settings.max_suggestions,
            self.settings.horizon_days,
        )
    }

    /// Try to book `request` for `contact`
    pub async fn book(
        &self,
        request: BookingRequest,
        contact: &Contact,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome> {
        let (Some(name), Some(date), Some(time)) = (&request.name, request.date, request.time) else {
            let missing = request.missing();
            return Ok(BookingOutcome::MissingDetails { request, missing });
        };

        let requested = self.schedule.to_utc(date, time);
        if requested <= now {
            return Ok(BookingOutcome::InPast { requested });
        }

        let busy = self.busy_from(date).await?;
        let slot = TimeRange::starting_at(requested, self.schedule.slot_length());

        if !self.schedule.is_within_hours(requested, self.schedule.slot_length()) {
            return Ok(BookingOutcome::OutsideHours {
                requested,
                alternatives: self.suggest(requested, &busy),
            });
        }

        if busy.iter().any(|b| b.overlaps(&slot)) {
            return Ok(BookingOutcome::SlotTaken {
                requested,
                alternatives: self.suggest(requested, &busy),
            });
        }

        let event = CalendarEvent::new(
            format!("{}: {}", self.settings.event_title, name),
            slot.start,
            slot.end,
        )
        .with_description(format!("WhatsApp: {}", contact.phone));

        let event = self.calendar.create_event(event).await?;
        info!("Booked {} at {} for {}", name, requested, contact.phone);

        Ok(BookingOutcome::Booked {
            name: name.clone(),
            event,
        })
    }

    /// Free slots on `date`, or on the next days that have any when no date
    /// is given. Slots that already started are never listed.
    pub async fn availability(
        &self,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Availability>> {
        let today = self.schedule.local_date(now);
        let first = date.unwrap_or(today).max(today);
        let busy = self.busy_from(first).await?;

        let day_slots = |date: NaiveDate| Availability {
            date,
            slots: self
                .schedule
                .free_slots(date, &busy)
                .into_iter()
                .filter(|slot| *slot > now)
                .collect(),
        };

        if let Some(date) = date {
            return Ok(vec![day_slots(date)]);
        }

        Ok(first
            .iter_days()
            .take(self.settings.horizon_days as usize + 1)
            .map(day_slots)
            .filter(|day| !day.slots.is_empty())
            .take(AVAILABILITY_DAYS)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use dg_calendar::MemoryCalendar;

    /// Monday 2025-03-10
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Clinic-local wall-clock time on `date` (+01:00)
    fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(time(h, m))) - Duration::hours(1)
    }

    fn now() -> DateTime<Utc> {
        at(monday(), 8, 0)
    }

    fn service(calendar: MemoryCalendar) -> BookingService {
        BookingService::from_config(Arc::new(calendar), &BookingConfig::default()).unwrap()
    }

    fn request(date: NaiveDate, h: u32, m: u32) -> BookingRequest {
        BookingRequest {
            name: Some("Ana".to_string()),
            date: Some(date),
            time: Some(time(h, m)),
        }
    }

    fn contact() -> Contact {
        Contact::new("34600111222", None)
    }

    #[tokio::test]
    async fn test_books_free_slot() {
        let calendar = MemoryCalendar::new();
        let service = service(calendar.clone());

        let outcome = service.book(request(monday(), 10, 0), &contact(), now()).await.unwrap();
        let BookingOutcome::Booked { name, event } = outcome else {
            panic!("expected a booking, got {:?}", outcome);
        };
        assert_eq!(name, "Ana");
        assert_eq!(event.summary, "Cita: Ana");
        assert_eq!(event.description.as_deref(), Some("WhatsApp: 34600111222"));
        assert_eq!(event.start, at(monday(), 10, 0));
        assert_eq!(event.end, at(monday(), 10, 30));
        assert_eq!(calendar.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_summer_booking_uses_daylight_time() {
        let calendar = MemoryCalendar::new();
        let service = service(calendar.clone());
        let july = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();

        let outcome = service.book(request(july, 9, 0), &contact(), now()).await.unwrap();
        let BookingOutcome::Booked { event, .. } = outcome else {
            panic!("expected a booking, got {:?}", outcome);
        };
        // 09:00 in Madrid on CEST is 07:00 UTC
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 7, 14, 7, 0, 0).unwrap());
        assert_eq!(calendar.events().await[0].start, event.start);
    }

    #[tokio::test]
    async fn test_missing_details() {
        let service = service(MemoryCalendar::new());
        let partial = BookingRequest {
            date: Some(monday()),
            ..Default::default()
        };
        let outcome = service.book(partial, &contact(), now()).await.unwrap();
        assert!(matches!(
            outcome,
            BookingOutcome::MissingDetails { ref missing, .. } if *missing == vec![Detail::Name, Detail::Time]
        ));
    }

    #[tokio::test]
    async fn test_past_request() {
        let service = service(MemoryCalendar::new());
        let outcome = service.book(request(monday(), 7, 30), &contact(), now()).await.unwrap();
        assert_eq!(
            outcome,
            BookingOutcome::InPast {
                requested: at(monday(), 7, 30)
            }
        );
    }

    #[tokio::test]
    async fn test_outside_hours_offers_alternatives() {
        let service = service(MemoryCalendar::new());
        let outcome = service.book(request(monday(), 15, 0), &contact(), now()).await.unwrap();
        assert_eq!(
            outcome,
            BookingOutcome::OutsideHours {
                requested: at(monday(), 15, 0),
                alternatives: vec![at(monday(), 16, 0), at(monday(), 16, 30), at(monday(), 17, 0)],
            }
        );
    }

    #[tokio::test]
    async fn test_sunday_rolls_to_monday() {
        let service = service(MemoryCalendar::new());
        let sunday = monday() + Duration::days(6);
        let outcome = service.book(request(sunday, 10, 0), &contact(), now()).await.unwrap();
        let BookingOutcome::OutsideHours { alternatives, .. } = outcome else {
            panic!("expected outside hours, got {:?}", outcome);
        };
        assert_eq!(alternatives[0], at(sunday + Duration::days(1), 9, 0));
    }

    #[tokio::test]
    async fn test_taken_slot_offers_next_free() {
        let calendar = MemoryCalendar::with_events(vec![
            CalendarEvent::new("Cita: Luis", at(monday(), 10, 0), at(monday(), 10, 30)),
            CalendarEvent::new("Cita: Eva", at(monday(), 10, 30), at(monday(), 11, 0)),
        ]);
        let service = service(calendar.clone());

        let outcome = service.book(request(monday(), 10, 0), &contact(), now()).await.unwrap();
        assert_eq!(
            outcome,
            BookingOutcome::SlotTaken {
                requested: at(monday(), 10, 0),
                alternatives: vec![at(monday(), 11, 0), at(monday(), 11, 30), at(monday(), 12, 0)],
            }
        );
        assert_eq!(calendar.events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_availability_for_today_hides_started_slots() {
        let calendar = MemoryCalendar::with_events(vec![CalendarEvent::new(
            "Cita: Luis",
            at(monday(), 19, 0),
            at(monday(), 19, 30),
        )]);
        let service = service(calendar);

        let days = service
            .availability(Some(monday()), at(monday(), 18, 10))
            .await
            .unwrap();
        assert_eq!(
            days,
            vec![Availability {
                date: monday(),
                slots: vec![at(monday(), 18, 30), at(monday(), 19, 30)],
            }]
        );
    }

    #[tokio::test]
    async fn test_availability_without_date_skips_closed_days() {
        let service = service(MemoryCalendar::new());
        let saturday = monday() + Duration::days(5);

        let days = service.availability(None, at(saturday, 15, 0)).await.unwrap();
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                monday() + Duration::days(7),
                monday() + Duration::days(8),
                monday() + Duration::days(9),
            ]
        );
    }
}
