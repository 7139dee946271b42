//! dg-booking: Appointment intent and slot engine
//!
//! Decides whether a message wants an appointment, pulls the name, date and
//! time out of it, and checks the request against opening hours and the
//! calendar before booking.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dg_booking::{BookingRequest, BookingService, Contact, reply};
//!
//! let service = BookingService::from_config(calendar, &config.booking)?;
//! let today = service.schedule().local_date(now);
//! let request = BookingRequest::parse(text, today).with_fallback_name(profile_name);
//! let outcome = service.book(request, &Contact::new(from, None), now).await?;
//! let text = reply::render_outcome(&outcome, service.schedule());
//! ```

pub mod error;
pub mod extract;
pub mod intent;
pub mod reply;
pub mod schedule;
pub mod service;

pub use error::{BookingError, Result};
pub use extract::{BookingRequest, Detail};
pub use intent::{Intent, IntentClassifier, KeywordClassifier, ModelClassifier, build_classifier};
pub use schedule::ClinicSchedule;
pub use service::{Availability, BookingOutcome, BookingService, BookingSettings, Contact};
