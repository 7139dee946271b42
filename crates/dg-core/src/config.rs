//! Configuration management
//!
//! Settings are resolved in this order of precedence:
//! 1. Environment variables
//! 2. `dental-gateway.toml`
//! 3. Built-in defaults
//!
//! `${VAR_NAME}` inside the TOML file is replaced with the value of the
//! environment variable before parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::clinic::ClinicProfile;
use crate::error::{Error, Result};

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "dental-gateway.toml";

const REDACTED: &str = "***";

/// LLM Provider type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API
    #[default]
    OpenAi,
    /// Anthropic Messages API
    Claude,
}

impl LlmProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "claude" | "anthropic" => LlmProvider::Claude,
            _ => LlmProvider::OpenAi,
        }
    }

    /// Default API endpoint for the provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Claude => "https://api.anthropic.com/v1",
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Token echoed back during the webhook verification handshake
    pub verify_token: String,
    /// Bearer token for the Graph API
    pub access_token: String,
    /// Sending phone number ID
    pub phone_number_id: String,
    /// App secret used to check `X-Hub-Signature-256` (optional)
    pub app_secret: Option<String>,
    pub api_version: String,
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            access_token: String::new(),
            phone_number_id: String::new(),
            app_secret: None,
            api_version: "v20.0".to_string(),
            api_base: "https://graph.facebook.com".to_string(),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. Without one the model is not consulted at all.
    pub api_key: Option<String>,
    pub model: String,
    pub provider: LlmProvider,
    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            provider: LlmProvider::OpenAi,
            base_url: None,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Whether a model can be consulted
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Effective API base URL
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// Which calendar backend answers availability and booking requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProviderKind {
    /// Booking is handed off to a human
    #[default]
    None,
    Google,
    Caldav,
    /// In-process calendar, lost on restart
    Memory,
}

impl CalendarProviderKind {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "google" => Ok(Self::Google),
            "caldav" => Ok(Self::Caldav),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!("Unknown calendar provider: {}", other))),
        }
    }
}

/// Google Calendar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleCalendarConfig {
    pub calendar_id: String,
    /// Service-account credentials as an inline JSON blob
    pub credentials_json: Option<String>,
    /// Service-account credentials file
    pub credentials_path: Option<String>,
    /// Pre-issued OAuth access token (skips the service-account exchange)
    pub access_token: Option<String>,
    pub api_base: String,
}

impl Default for GoogleCalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            credentials_json: None,
            credentials_path: None,
            access_token: None,
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// CalDAV settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaldavConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Calendar collection path below the server URL
    pub calendar_path: Option<String>,
}

/// Calendar configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub provider: CalendarProviderKind,
    pub google: GoogleCalendarConfig,
    pub caldav: CaldavConfig,
}

/// How booking intent is recognised
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntentMode {
    #[default]
    Keyword,
    Model,
}

/// One opening window, e.g. `days = ["mon", "tue"]`, `open = "09:00"`, `close = "14:00"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpeningHours {
    pub days: Vec<String>,
    pub open: String,
    pub close: String,
}

impl OpeningHours {
    pub fn new(days: &[&str], open: &str, close: &str) -> Self {
        Self {
            days: days.iter().map(|d| d.to_string()).collect(),
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

/// Appointment booking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub intent_mode: IntentMode,
    /// Length of one appointment slot in minutes
    pub slot_minutes: u32,
    /// IANA time zone of the clinic, e.g. `Europe/Madrid`
    pub timezone: String,
    pub hours: Vec<OpeningHours>,
    /// Alternatives offered when the requested slot is unavailable
    pub max_suggestions: usize,
    /// How many days ahead alternatives are searched
    pub horizon_days: u32,
    /// Prefix of the calendar event summary
    pub event_title: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        let weekdays = ["mon", "tue", "wed", "thu", "fri"];
        Self {
            intent_mode: IntentMode::Keyword,
            slot_minutes: 30,
            timezone: "Europe/Madrid".to_string(),
            hours: vec![
                OpeningHours::new(&weekdays, "09:00", "14:00"),
                OpeningHours::new(&weekdays, "16:00", "20:00"),
                OpeningHours::new(&["sat"], "10:00", "14:00"),
            ],
            max_suggestions: 3,
            horizon_days: 14,
            event_title: "Cita".to_string(),
        }
    }
}

/// Main configuration for dental-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub booking: BookingConfig,
    pub clinic: ClinicProfile,
}

impl Config {
    /// Replace `${VAR_NAME}` with values returned by `lookup`.
    ///
    /// Unknown variables expand to an empty string.
    fn expand_vars(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Some(env_value) = lookup(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse TOML text, expanding `${VAR}` references first
    pub fn from_toml_str(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let expanded = Self::expand_vars(content, &lookup);
        let mut config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_toml_str(&content, env_lookup)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Build a configuration from defaults plus the given variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Read `dental-gateway.toml` when present, else the environment
    pub fn read() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            Self::from_toml_file(CONFIG_FILE)
        } else {
            Self::from_env()
        }
    }

    /// [`Config::read`], then validate
    pub fn load() -> Result<Self> {
        let config = Self::read()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings with variables from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Server
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", port)))?;
        }

        // WhatsApp
        if let Some(token) = get("VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }
        if let Some(token) = get("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = token;
        }
        if let Some(id) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Some(secret) = get("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(secret);
        }
        if let Some(version) = get("WHATSAPP_API_VERSION") {
            self.whatsapp.api_version = version;
        }
        if let Some(base) = get("WHATSAPP_API_BASE") {
            self.whatsapp.api_base = base;
        }

        // LLM: LLM_API_KEY wins over OPENAI_API_KEY
        if let Some(key) = get("LLM_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&provider);
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }

        // Calendar
        if let Some(provider) = get("CALENDAR_PROVIDER") {
            self.calendar.provider = CalendarProviderKind::parse(&provider)?;
        }
        if let Some(id) = get("GOOGLE_CALENDAR_ID") {
            self.calendar.google.calendar_id = id;
        }
        if let Some(json) = get("GOOGLE_CREDENTIALS_JSON") {
            self.calendar.google.credentials_json = Some(json);
        }
        if let Some(path) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.calendar.google.credentials_path = Some(path);
        }
        if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            self.calendar.google.access_token = Some(token);
        }
        if let Some(url) = get("CALDAV_URL") {
            self.calendar.caldav.server_url = url;
        }
        if let Some(user) = get("CALDAV_USERNAME") {
            self.calendar.caldav.username = user;
        }
        if let Some(password) = get("CALDAV_PASSWORD") {
            self.calendar.caldav.password = password;
        }
        if let Some(path) = get("CALDAV_CALENDAR") {
            self.calendar.caldav.calendar_path = Some(path);
        }

        // Booking
        if let Some(mode) = get("BOOKING_INTENT_MODE") {
            self.booking.intent_mode = match mode.to_lowercase().as_str() {
                "model" | "llm" => IntentMode::Model,
                _ => IntentMode::Keyword,
            };
        }
        if let Some(minutes) = get("BOOKING_SLOT_MINUTES") {
            self.booking.slot_minutes = minutes
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid BOOKING_SLOT_MINUTES: {}", minutes)))?;
        }
        if let Some(zone) = get("CLINIC_TIMEZONE") {
            self.booking.timezone = zone.trim().to_string();
        }

        Ok(())
    }

    /// Check that everything needed to serve the webhook is present
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.whatsapp.verify_token.is_empty() {
            missing.push("VERIFY_TOKEN");
        }
        if self.whatsapp.access_token.is_empty() {
            missing.push("WHATSAPP_TOKEN");
        }
        if self.whatsapp.phone_number_id.is_empty() {
            missing.push("WHATSAPP_PHONE_NUMBER_ID");
        }

        match self.calendar.provider {
            CalendarProviderKind::Google => {
                let google = &self.calendar.google;
                if google.credentials_json.is_none()
                    && google.credentials_path.is_none()
                    && google.access_token.is_none()
                {
                    missing.push("GOOGLE_CREDENTIALS_JSON");
                }
            }
            CalendarProviderKind::Caldav => {
                if self.calendar.caldav.server_url.is_empty() {
                    missing.push("CALDAV_URL");
                }
            }
            CalendarProviderKind::None | CalendarProviderKind::Memory => {}
        }

        if self.booking.slot_minutes == 0 {
            return Err(Error::Config("booking.slot_minutes must be positive".to_string()));
        }
        if self.booking.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(Error::Config(format!(
                "booking.timezone is not an IANA zone: {}",
                self.booking.timezone
            )));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("Missing settings: {}", missing.join(", "))))
        }
    }

    /// Copy of the configuration with every secret masked
    pub fn redacted(&self) -> Self {
        let mask = |s: &String| {
            if s.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };

        let mut config = self.clone();
        config.whatsapp.verify_token = mask(&config.whatsapp.verify_token);
        config.whatsapp.access_token = mask(&config.whatsapp.access_token);
        config.whatsapp.app_secret = config.whatsapp.app_secret.as_ref().map(mask);
        config.llm.api_key = config.llm.api_key.as_ref().map(mask);
        config.calendar.google.credentials_json =
            config.calendar.google.credentials_json.as_ref().map(mask);
        config.calendar.google.access_token =
            config.calendar.google.access_token.as_ref().map(mask);
        config.calendar.caldav.password = mask(&config.calendar.caldav.password);
        config
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("VERIFY_TOKEN", "verify"),
            ("WHATSAPP_TOKEN", "wa-token"),
            ("WHATSAPP_PHONE_NUMBER_ID", "12345"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.whatsapp.api_version, "v20.0");
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert!(!config.llm.is_enabled());
        assert_eq!(config.calendar.provider, CalendarProviderKind::None);
        assert_eq!(config.booking.slot_minutes, 30);
        assert_eq!(config.booking.timezone, "Europe/Madrid");
        assert_eq!(config.booking.hours.len(), 3);
    }

    #[test]
    fn test_from_lookup_required_values() {
        let config = Config::from_lookup(vars(&required())).unwrap();
        assert_eq!(config.whatsapp.verify_token, "verify");
        assert_eq!(config.whatsapp.access_token, "wa-token");
        assert_eq!(config.whatsapp.phone_number_id, "12345");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing() {
        let config = Config::from_lookup(vars(&[("VERIFY_TOKEN", "v")])).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("WHATSAPP_TOKEN"));
        assert!(err.contains("WHATSAPP_PHONE_NUMBER_ID"));
        assert!(!err.contains("VERIFY_TOKEN"));
    }

    #[test]
    fn test_openai_key_fallback() {
        let mut pairs = required();
        pairs.push(("OPENAI_API_KEY", "sk-openai"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
        assert!(config.llm.is_enabled());

        pairs.push(("LLM_API_KEY", "sk-llm"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-llm"));
    }

    #[test]
    fn test_provider_override() {
        let config = Config::from_lookup(vars(&[("LLM_PROVIDER", "anthropic")])).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Claude);
        assert_eq!(config.llm.base_url(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn test_timezone_override_is_validated() {
        let mut pairs = required();
        pairs.push(("CLINIC_TIMEZONE", "America/Mexico_City"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert_eq!(config.booking.timezone, "America/Mexico_City");
        assert!(config.validate().is_ok());

        pairs.push(("CLINIC_TIMEZONE", "+01:00"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(ref msg)) if msg.contains("+01:00")));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(vars(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_calendar_provider() {
        let result = Config::from_lookup(vars(&[("CALENDAR_PROVIDER", "outlook")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_google_requires_credentials() {
        let mut pairs = required();
        pairs.push(("CALENDAR_PROVIDER", "google"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert!(config.validate().is_err());

        pairs.push(("GOOGLE_ACCESS_TOKEN", "ya29.token"));
        let config = Config::from_lookup(vars(&pairs)).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_vars() {
        let lookup = vars(&[("DG_TEST_VAR", "test_value")]);
        let result = Config::expand_vars("prefix_${DG_TEST_VAR}_suffix", &lookup);
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_vars("prefix_${NONEXISTENT_VAR}_suffix", &lookup);
        assert_eq!(result, "prefix__suffix");

        assert_eq!(Config::expand_vars("no_vars_here", &lookup), "no_vars_here");
        assert_eq!(Config::expand_vars("${}_content", &lookup), "_content");
        assert_eq!(Config::expand_vars("cost: $5", &lookup), "cost: $5");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_content = r#"
[server]
port = 9000

[whatsapp]
verify_token = "${DG_VERIFY}"
access_token = "token"
phone_number_id = "555"

[llm]
provider = "claude"
model = "claude-sonnet-4-20250514"
api_key = "key"

[calendar]
provider = "caldav"

[calendar.caldav]
server_url = "https://dav.example.com"
username = "clinic"
password = "secret"

[booking]
slot_minutes = 45
timezone = "Atlantic/Canary"
hours = [{ days = ["mon"], open = "08:00", close = "12:00" }]

[clinic]
name = "Clínica Test"
"#;

        let config = Config::from_toml_str(toml_content, vars(&[("DG_VERIFY", "from-env")])).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.whatsapp.verify_token, "from-env");
        assert_eq!(config.llm.provider, LlmProvider::Claude);
        assert_eq!(config.calendar.provider, CalendarProviderKind::Caldav);
        assert_eq!(config.calendar.caldav.username, "clinic");
        assert_eq!(config.booking.slot_minutes, 45);
        assert_eq!(config.booking.hours, vec![OpeningHours::new(&["mon"], "08:00", "12:00")]);
        assert_eq!(config.booking.max_suggestions, 3);
        assert_eq!(config.booking.timezone, "Atlantic/Canary");
        assert_eq!(config.clinic.name, "Clínica Test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_toml() {
        let toml_content = r#"
[server]
port = 9000
"#;
        let config = Config::from_toml_str(toml_content, vars(&[("PORT", "9100")])).unwrap();
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[booking]\nmax_suggestions = 5\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert_eq!(config.booking.max_suggestions, 5);

        assert!(Config::from_toml_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_example_file_parses() {
        let example = include_str!("../../../dental-gateway.toml.example");
        let config = Config::from_toml_str(example, vars(&required())).unwrap();
        assert_eq!(config.whatsapp.access_token, "wa-token");
        assert_eq!(config.calendar.provider, CalendarProviderKind::Google);
        assert_eq!(config.booking.hours.len(), 3);
        assert_eq!(config.clinic.menu.len(), 6);
        assert!(config.clinic.knowledge.contains("Calle Mayor 12"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redacted() {
        let mut pairs = required();
        pairs.push(("LLM_API_KEY", "sk-secret"));
        let config = Config::from_lookup(vars(&pairs)).unwrap().redacted();
        assert_eq!(config.whatsapp.access_token, "***");
        assert_eq!(config.llm.api_key.as_deref(), Some("***"));
        assert_eq!(config.whatsapp.phone_number_id, "12345");
        assert!(config.whatsapp.app_secret.is_none());

        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("sk-secret"));
    }
}
