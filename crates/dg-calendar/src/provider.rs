//! Calendar provider abstraction

use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use dg_core::{CalendarConfig, CalendarProviderKind};
use tracing::info;

use crate::caldav::CaldavClient;
use crate::error::Result;
use crate::google::GoogleCalendarClient;
use crate::memory::MemoryCalendar;
use crate::models::{CalendarEvent, TimeRange};

/// A calendar the booking engine can read and write
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Events overlapping `range`
    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>>;

    /// Create `event`, returning it with its provider-assigned id
    async fn create_event(&self, event: CalendarEvent) -> Result<CalendarEvent>;
}

/// Build the configured provider, or `None` when booking goes to a human.
///
/// `zone` is the clinic's time zone, used for all-day and floating times.
pub fn build_provider(
    config: &CalendarConfig,
    zone: Tz,
) -> Result<Option<Arc<dyn CalendarProvider>>> {
    let provider: Arc<dyn CalendarProvider> = match config.provider {
        CalendarProviderKind::None => {
            info!("No calendar configured, bookings are handed off");
            return Ok(None);
        }
        CalendarProviderKind::Google => Arc::new(GoogleCalendarClient::new(&config.google, zone)?),
        CalendarProviderKind::Caldav => Arc::new(CaldavClient::new(&config.caldav, zone)?),
        CalendarProviderKind::Memory => Arc::new(MemoryCalendar::new()),
    };

    info!("Calendar provider: {}", provider.name());
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> Tz {
        Tz::UTC
    }

    #[test]
    fn test_build_none() {
        let config = CalendarConfig::default();
        assert!(build_provider(&config, utc()).unwrap().is_none());
    }

    #[test]
    fn test_build_memory() {
        let config = CalendarConfig {
            provider: CalendarProviderKind::Memory,
            ..Default::default()
        };
        let provider = build_provider(&config, utc()).unwrap().unwrap();
        assert_eq!(provider.name(), "memory");
    }

    #[test]
    fn test_build_google_with_token() {
        let mut config = CalendarConfig {
            provider: CalendarProviderKind::Google,
            ..Default::default()
        };
        assert!(build_provider(&config, utc()).is_err());

        config.google.access_token = Some("ya29.token".to_string());
        let provider = build_provider(&config, utc()).unwrap().unwrap();
        assert_eq!(provider.name(), "google");
    }

    #[test]
    fn test_build_caldav_requires_url() {
        let config = CalendarConfig {
            provider: CalendarProviderKind::Caldav,
            ..Default::default()
        };
        assert!(build_provider(&config, utc()).is_err());
    }
}
