//! Google Calendar v3 client
//!
//! Authenticates either with a pre-issued access token or with a service
//! account: a signed RS256 JWT is exchanged for an access token, which is
//! cached until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use dg_core::GoogleCalendarConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CalendarError, Result};
use crate::models::{CalendarEvent, TimeRange, resolve_local};
use crate::provider::CalendarProvider;

const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
const PAGE_SIZE: &str = "250";

/// The fields of a service-account JSON key that are needed here
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a service-account credentials blob
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CalendarError::Configuration(format!("Invalid service account JSON: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

enum Auth {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
        cache: RwLock<Option<CachedToken>>,
    },
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    transparency: Option<String>,
    #[serde(default)]
    start: Option<EventTime>,
    #[serde(default)]
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewEvent<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: EventTime,
    end: EventTime,
}

/// Google Calendar API client
pub struct GoogleCalendarClient {
    client: Client,
    calendar_id: String,
    api_base: String,
    zone: Tz,
    auth: Auth,
}

impl GoogleCalendarClient {
    /// Create a new client.
    ///
    /// An explicit access token wins over service-account credentials; inline
    /// credentials win over a credentials file.
    pub fn new(config: &GoogleCalendarConfig, zone: Tz) -> Result<Self> {
        let auth = if let Some(token) = config.access_token.as_ref().filter(|t| !t.is_empty()) {
            Auth::Static(token.clone())
        } else {
            let key = if let Some(json) = &config.credentials_json {
                ServiceAccountKey::from_json(json)?
            } else if let Some(path) = &config.credentials_path {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    CalendarError::Configuration(format!("Failed to read {}: {}", path, e))
                })?;
                ServiceAccountKey::from_json(&json)?
            } else {
                return Err(CalendarError::Configuration(
                    "Google Calendar credentials not set".to_string(),
                ));
            };

            let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                .map_err(|e| CalendarError::Configuration(format!("Invalid private key: {}", e)))?;

            info!("Google Calendar service account: {}", key.client_email);
            Auth::ServiceAccount {
                key,
                encoding_key,
                cache: RwLock::new(None),
            }
        };

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            calendar_id: config.calendar_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            zone,
            auth,
        })
    }

    /// Access token for the next request
    async fn access_token(&self) -> Result<String> {
        let (key, encoding_key, cache) = match &self.auth {
            Auth::Static(token) => return Ok(token.clone()),
            Auth::ServiceAccount {
                key,
                encoding_key,
                cache,
            } => (key, encoding_key, cache),
        };

        let now = Utc::now();
        if let Some(cached) = cache.read().await.as_ref() {
            if cached.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.exchange_jwt(key, encoding_key, now).await?;
        let token = fresh.token.clone();
        *cache.write().await = Some(fresh);
        Ok(token)
    }

    async fn exchange_jwt(
        &self,
        key: &ServiceAccountKey,
        encoding_key: &EncodingKey,
        now: DateTime<Utc>,
    ) -> Result<CachedToken> {
        let claims = JwtClaims {
            iss: &key.client_email,
            scope: CALENDAR_SCOPE,
            aud: &key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, encoding_key)
            .map_err(|e| CalendarError::Authentication(format!("Failed to sign JWT: {}", e)))?;

        debug!("Requesting Google access token from {}", key.token_uri);

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Google token exchange failed: {} - {}", status, body);
            return Err(CalendarError::Authentication(format!("{} - {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::ParseError(e.to_string()))?;

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| CalendarError::Configuration(format!("Invalid API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Configuration("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("Google Calendar API error: {} - {}", status, body);
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CalendarError::Authentication(format!("{} - {}", status, body)));
        }
        Err(CalendarError::Api {
            status: status.as_u16(),
            body,
        })
    }

    fn event_time(&self, at: DateTime<Utc>) -> EventTime {
        EventTime {
            date_time: Some(at.with_timezone(&self.zone).fixed_offset()),
            date: None,
        }
    }

    /// Resolve an event time; all-day dates start at local midnight
    fn resolve_time(&self, time: &EventTime) -> Option<DateTime<Utc>> {
        if let Some(dt) = time.date_time {
            return Some(dt.with_timezone(&Utc));
        }
        let midnight = time.date?.and_hms_opt(0, 0, 0)?;
        Some(resolve_local(self.zone, midnight))
    }

    fn convert(&self, event: GoogleEvent) -> Option<CalendarEvent> {
        if event.status.as_deref() == Some("cancelled")
            || event.transparency.as_deref() == Some("transparent")
        {
            return None;
        }
        let start = self.resolve_time(event.start.as_ref()?)?;
        let end = event
            .end
            .as_ref()
            .and_then(|t| self.resolve_time(t))
            .unwrap_or(start);

        Some(CalendarEvent {
            id: event.id,
            summary: event.summary.unwrap_or_default(),
            description: event.description,
            start,
            end,
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>> {
        let url = self.events_url()?;
        let token = self.access_token().await?;
        let time_min = range.start.to_rfc3339();
        let time_max = range.end.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(page) = page_token.as_deref() {
                query.push(("pageToken", page));
            }

            debug!("Listing Google Calendar events: {}", url);

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await?;
            let page: EventList = Self::check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| CalendarError::ParseError(e.to_string()))?;

            events.extend(page.items.into_iter().filter_map(|e| self.convert(e)));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        info!("Fetched {} events", events.len());
        Ok(events)
    }

    async fn create_event(&self, mut event: CalendarEvent) -> Result<CalendarEvent> {
        let url = self.events_url()?;
        let token = self.access_token().await?;

        let body = NewEvent {
            summary: &event.summary,
            description: event.description.as_deref(),
            start: self.event_time(event.start),
            end: self.event_time(event.end),
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let created: GoogleEvent = Self::check_status(response)
            .await
            .map_err(|e| CalendarError::CreateError(e.to_string()))?
            .json()
            .await
            .map_err(|e| CalendarError::ParseError(e.to_string()))?;

        info!("Created event: {:?}", created.id);

        event.id = created.id;
        Ok(event)
    }
}
