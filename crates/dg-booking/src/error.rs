//! Error types for dg-booking

use thiserror::Error;

/// dg-booking error type
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Calendar error: {0}")]
    Calendar(#[from] dg_calendar::CalendarError),

    #[error("Model error: {0}")]
    Model(#[from] dg_core::Error),

    #[error("Invalid opening hours: {0}")]
    Schedule(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BookingError>;
