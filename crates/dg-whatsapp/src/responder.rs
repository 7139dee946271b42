//! Chooses the reply for one inbound message
//!
//! Order: greeting → menu, menu option → its action, booking intent (only
//! with a calendar) → booking service, anything else → model answer grounded
//! in the clinic knowledge, or the fallback text when no model is set.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dg_booking::{
    BookingRequest, BookingService, Contact, Intent, IntentClassifier, extract, reply,
};
use dg_core::{ClinicProfile, LlmClient, MenuAction};
use tracing::{debug, warn};

use crate::api::IncomingText;
use crate::error::Result;

struct BookingDesk {
    service: BookingService,
    classifier: Arc<dyn IntentClassifier>,
}

/// Builds replies for inbound texts
pub struct Responder {
    clinic: ClinicProfile,
    system_prompt: String,
    llm: Option<Arc<LlmClient>>,
    booking: Option<BookingDesk>,
}

impl Responder {
    pub fn new(clinic: ClinicProfile, llm: Option<Arc<LlmClient>>) -> Self {
        let system_prompt = clinic.render_system_prompt();
        Self {
            clinic,
            system_prompt,
            llm,
            booking: None,
        }
    }

    /// Enable calendar booking
    pub fn with_booking(mut self, service: BookingService, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.booking = Some(BookingDesk {
            service,
            classifier,
        });
        self
    }

    pub fn clinic(&self) -> &ClinicProfile {
        &self.clinic
    }

    /// Reply to `message`. Failures of the model or the calendar turn into
    /// the clinic's apology text.
    pub async fn respond(&self, message: &IncomingText, now: DateTime<Utc>) -> String {
        match self.try_respond(message, now).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to answer {}: {}", message.from, e);
                self.clinic.error_reply.clone()
            }
        }
    }

    async fn try_respond(&self, message: &IncomingText, now: DateTime<Utc>) -> Result<String> {
        let text = message.text.trim();
        let normalized = text.to_lowercase();

        if self.clinic.is_greeting(&normalized) {
            return Ok(self.clinic.render_menu());
        }

        if let Some(option) = self.clinic.find_option(&normalized) {
            debug!("Menu option {} selected by {}", option.key, message.from);
            return match &option.action {
                MenuAction::Reply { text } | MenuAction::Handoff { text } => Ok(text.clone()),
                MenuAction::Ask { question } => self.answer(question).await,
                MenuAction::Booking => Ok(match self.booking {
                    Some(_) => reply::booking_help(),
                    None => self.clinic.booking_instructions.clone(),
                }),
            };
        }

        if let Some(desk) = &self.booking {
            match desk.classifier.classify(text).await {
                Intent::Book => return self.book(desk, message, now).await,
                Intent::CheckAvailability => return self.availability(desk, text, now).await,
                Intent::Inform => {}
            }
        }

        self.answer(text).await
    }

    async fn book(&self, desk: &BookingDesk, message: &IncomingText, now: DateTime<Utc>) -> Result<String> {
        let schedule = desk.service.schedule();
        let request = BookingRequest::parse(&message.text, schedule.local_date(now))
            .with_fallback_name(message.profile_name.as_deref());
        let contact = Contact::new(message.from.clone(), message.profile_name.clone());

        let outcome = desk.service.book(request, &contact, now).await?;
        Ok(reply::render_outcome(&outcome, schedule))
    }

    async fn availability(&self, desk: &BookingDesk, text: &str, now: DateTime<Utc>) -> Result<String> {
        let schedule = desk.service.schedule();
        let date = extract::extract_date(text, schedule.local_date(now));
        let days = desk.service.availability(date, now).await?;
        Ok(reply::render_availability(&days, schedule))
    }

    /// Model answer grounded in the clinic knowledge
    async fn answer(&self, question: &str) -> Result<String> {
        let Some(llm) = &self.llm else {
            return Ok(self.clinic.fallback_reply.clone());
        };
        Ok(llm.complete(&self.system_prompt, question).await?)
    }
}
