//! dg-calendar: Calendar backends for dental-gateway
//!
//! The booking engine talks to a single [`CalendarProvider`]; this crate
//! supplies the implementations.
//!
//! ## Providers
//!
//! - Google Calendar (access token or service account)
//! - CalDAV (Nextcloud, iCloud, Fastmail, ...)
//! - In-memory calendar for local runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dg_calendar::{build_provider, parse_timezone, TimeRange};
//!
//! let zone = parse_timezone(&config.booking.timezone)?;
//! if let Some(calendar) = build_provider(&config.calendar, zone)? {
//!     let busy = calendar.list_events(TimeRange::new(from, to)).await?;
//! }
//! ```

pub mod caldav;
pub mod error;
pub mod google;
pub mod memory;
pub mod models;
pub mod provider;

pub use caldav::CaldavClient;
pub use error::{CalendarError, Result};
pub use google::{GoogleCalendarClient, ServiceAccountKey};
pub use memory::MemoryCalendar;
pub use models::{CalendarEvent, TimeRange, parse_timezone, resolve_local};
pub use provider::{CalendarProvider, build_provider};
