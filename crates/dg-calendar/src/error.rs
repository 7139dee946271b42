//! Error types for dg-calendar

use thiserror::Error;

/// dg-calendar error type
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Calendar API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("CalDAV error: {0}")]
    CaldavError(String),

    #[error("XML parsing error: {0}")]
    XmlParseError(String),

    #[error("Create error: {0}")]
    CreateError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::Connection(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalendarError>;
