//! WhatsApp Cloud API client and webhook payloads

use dg_core::WhatsAppConfig;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WhatsAppError};

/// Longest text body the Cloud API accepts
pub const MAX_TEXT_CHARS: usize = 4096;

const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Serialize)]
struct SendTextPayload<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Cut `text` to the Cloud API limit on a char boundary, ending with an ellipsis
pub fn truncate_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_TEXT_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// WhatsApp Cloud API client
#[derive(Debug, Clone)]
pub struct CloudApiClient {
    client: Client,
    access_token: String,
    messages_url: String,
}

impl CloudApiClient {
    pub fn new(config: &WhatsAppConfig) -> Self {
        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );
        Self {
            client: Client::new(),
            access_token: config.access_token.clone(),
            messages_url,
        }
    }

    /// Send a text message, returning the WhatsApp message id
    pub async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>> {
        let body = truncate_text(body);
        let payload = SendTextPayload {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body: &body },
        };

        debug!("Sending message to {}: {}", to, body);

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("WhatsApp API error: {} - {}", status, body);
            return Err(WhatsAppError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SendResponse = response.json().await.unwrap_or_default();
        let id = sent.messages.into_iter().next().map(|m| m.id);
        info!("Message sent to {}: {:?}", to, id);
        Ok(id)
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Query of the subscription handshake (`GET /webhook`)
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

/// Accept the handshake only for `subscribe` with the configured token,
/// returning the challenge to echo
pub fn verify_challenge(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Result<String> {
    if mode == Some("subscribe") && !expected_token.is_empty() && token == Some(expected_token) {
        info!("Webhook verified successfully");
        Ok(challenge.unwrap_or_default().to_string())
    } else {
        warn!("Webhook verification failed: invalid mode or token");
        Err(WhatsAppError::VerificationFailed)
    }
}

/// Check `X-Hub-Signature-256` (`sha256=<hex>`) against the raw body
pub fn verify_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_sig) = header.and_then(|h| h.trim().strip_prefix(SIGNATURE_PREFIX)) else {
        return false;
    };
    let Ok(signature) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

// ============================================================================
// Inbound payload
// ============================================================================

/// `POST /webhook` body
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<InboundText>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboundText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Interactive {
    #[serde(default)]
    pub button_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub list_reply: Option<InteractiveReply>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InteractiveReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl InboundMessage {
    /// Text to answer: the body of a text message or the id of a button/list reply
    pub fn text(&self) -> Option<&str> {
        let text = match self.kind.as_str() {
            "text" => self.text.as_ref().map(|t| t.body.as_str()),
            "interactive" => self.interactive.as_ref().and_then(|i| {
                i.button_reply
                    .as_ref()
                    .or(i.list_reply.as_ref())
                    .map(|r| r.id.as_str())
            }),
            _ => None,
        }?;
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }
}

/// A message worth answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingText {
    pub from: String,
    pub profile_name: Option<String>,
    pub text: String,
}

impl WebhookPayload {
    /// Every answerable message across all entries and changes, in order
    pub fn incoming(&self) -> Vec<IncomingText> {
        let mut found = Vec::new();
        for change in self.entry.iter().flat_map(|e| &e.changes) {
            let value = &change.value;
            for message in &value.messages {
                let Some(text) = message.text() else {
                    debug!("Ignoring {} message from {}", message.kind, message.from);
                    continue;
                };
                if message.from.is_empty() {
                    continue;
                }
                let profile_name = value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id.as_deref() == Some(message.from.as_str()))
                    .or(value.contacts.first())
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| p.name.clone());

                found.push(IncomingText {
                    from: message.from.clone(),
                    profile_name,
                    text: text.to_string(),
                });
            }
        }
        found
    }
}
