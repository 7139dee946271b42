//! dg-whatsapp: WhatsApp Cloud API channel for dental-gateway
//!
//! Receives messages on the Meta webhook, picks a reply (menu, booking or a
//! knowledge-grounded model answer) and sends it back through the Cloud API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dg_whatsapp::{CloudApiClient, Responder, WebhookServer, WebhookState};
//!
//! let state = WebhookState {
//!     whatsapp: CloudApiClient::new(&config.whatsapp),
//!     responder: Responder::new(config.clinic.clone(), llm),
//!     verify_token: config.whatsapp.verify_token.clone(),
//!     app_secret: config.whatsapp.app_secret.clone(),
//! };
//! WebhookServer::new(addr, state).start(shutdown).await?;
//! ```

pub mod api;
pub mod error;
pub mod responder;
pub mod webhook;

pub use api::{CloudApiClient, IncomingText, WebhookPayload, verify_challenge, verify_signature};
pub use error::{Result, WhatsAppError};
pub use responder::Responder;
pub use webhook::{WebhookServer, WebhookState, create_router};
