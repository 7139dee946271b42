//! dg-core: Dental Gateway Core Library
//!
//! Configuration, the language-model client and the clinic profile
//! (menu, knowledge text, canned replies) shared by every other crate.

pub mod clinic;
pub mod config;
pub mod error;
pub mod llm;

pub use clinic::{ClinicProfile, MenuAction, MenuOption};
pub use config::{
    BookingConfig, CONFIG_FILE, CaldavConfig, CalendarConfig, CalendarProviderKind, Config,
    GoogleCalendarConfig, IntentMode, LlmConfig, LlmProvider, OpeningHours, ServerConfig,
    WhatsAppConfig,
};
pub use error::{Error, Result};
pub use llm::LlmClient;
