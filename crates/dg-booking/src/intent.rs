//! Booking intent classification

use std::sync::Arc;

use async_trait::async_trait;
use dg_core::{IntentMode, LlmClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a free-text message is after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Wants to book an appointment
    Book,
    /// Asks which slots are free
    CheckAvailability,
    /// Anything else; answered from the clinic knowledge
    Inform,
}

/// Turns a message into an [`Intent`]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Intent;
}

const BOOK_WORDS: &[&str] = &[
    "cita",
    "citas",
    "reservar",
    "reserva",
    "agendar",
    "pedir hora",
    "coger hora",
    "turno",
    "book",
    "booking",
    "appointment",
    "schedule",
];

const CHECK_WORDS: &[&str] = &[
    "disponibilidad",
    "disponible",
    "disponibles",
    "hueco",
    "huecos",
    "horas libres",
    "hora libre",
    "qué horas",
    "que horas",
    "cuándo hay",
    "cuando hay",
    "availability",
    "available",
    "free slot",
    "free slots",
    "open slots",
];

/// Whole-word (or whole-phrase) match
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Keyword matcher. Availability words win over booking words, so
/// "¿hay huecos para una cita?" is a check, not a booking.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    book: Vec<String>,
    check: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(BOOK_WORDS, CHECK_WORDS)
    }
}

impl KeywordClassifier {
    pub fn new(book: &[&str], check: &[&str]) -> Self {
        Self {
            book: book.iter().map(|w| w.to_lowercase()).collect(),
            check: check.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Synchronous classification
    pub fn classify_text(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();
        if self.check.iter().any(|w| contains_phrase(&lower, w)) {
            Intent::CheckAvailability
        } else if self.book.iter().any(|w| contains_phrase(&lower, w)) {
            Intent::Book
        } else {
            Intent::Inform
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Intent {
        self.classify_text(text)
    }
}

const CLASSIFY_PROMPT: &str = "You classify messages sent to a dental clinic's WhatsApp assistant.\n\
    Answer with exactly one word:\n\
    BOOK if the user wants to book, request or schedule an appointment;\n\
    CHECK if the user asks which days or times are free;\n\
    INFORM for anything else.";

/// Asks the language model for a label, falling back to keywords
pub struct ModelClassifier {
    llm: Arc<LlmClient>,
    fallback: KeywordClassifier,
}

impl ModelClassifier {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            fallback: KeywordClassifier::default(),
        }
    }

    fn parse_label(answer: &str) -> Option<Intent> {
        let label = answer
            .trim()
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_uppercase();
        match label.as_str() {
            "BOOK" => Some(Intent::Book),
            "CHECK" => Some(Intent::CheckAvailability),
            "INFORM" => Some(Intent::Inform),
            _ => None,
        }
    }
}

#[async_trait]
impl IntentClassifier for ModelClassifier {
    async fn classify(&self, text: &str) -> Intent {
        match self.llm.complete(CLASSIFY_PROMPT, text).await {
            Ok(answer) => match Self::parse_label(&answer) {
                Some(intent) => {
                    debug!("Model classified message as {:?}", intent);
                    intent
                }
                None => {
                    warn!("Unexpected intent label from model: {}", answer);
                    self.fallback.classify_text(text)
                }
            },
            Err(e) => {
                warn!("Intent classification failed, using keywords: {}", e);
                self.fallback.classify_text(text)
            }
        }
    }
}

/// Pick the classifier for `mode`. Model mode without a model degrades to keywords.
pub fn build_classifier(mode: IntentMode, llm: Option<Arc<LlmClient>>) -> Arc<dyn IntentClassifier> {
    match (mode, llm) {
        (IntentMode::Model, Some(llm)) => Arc::new(ModelClassifier::new(llm)),
        (IntentMode::Model, None) => {
            warn!("Model intent mode needs an LLM API key, using keywords");
            Arc::new(KeywordClassifier::default())
        }
        (IntentMode::Keyword, _) => Arc::new(KeywordClassifier::default()),
    }
}
