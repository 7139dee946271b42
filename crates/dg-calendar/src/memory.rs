//! In-process calendar
//!
//! Useful for local runs and tests; events vanish with the process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::models::{CalendarEvent, TimeRange};
use crate::provider::CalendarProvider;

/// In-memory calendar
#[derive(Debug, Clone, Default)]
pub struct MemoryCalendar {
    events: Arc<RwLock<Vec<CalendarEvent>>>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calendar pre-filled with `events`
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Arc::new(RwLock::new(events)),
        }
    }

    /// Snapshot of every stored event
    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl CalendarProvider for MemoryCalendar {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>> {
        let events = self.events.read().await;
        let mut found: Vec<_> = events
            .iter()
            .filter(|e| e.range().overlaps(&range))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    async fn create_event(&self, mut event: CalendarEvent) -> Result<CalendarEvent> {
        let id = event
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        debug!("Storing event {} ({})", id, event.summary);

        self.events.write().await.push(event.clone());
        Ok(event)
    }
}
