//! Error types for dg-whatsapp

use thiserror::Error;

/// dg-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Webhook verification failed: invalid mode or token")]
    VerificationFailed,

    #[error("WhatsApp API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Booking error: {0}")]
    Booking(#[from] dg_booking::BookingError),

    #[error("Model error: {0}")]
    Model(#[from] dg_core::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        WhatsAppError::Http(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
